/// Range checks applied to every ingested row before it becomes an observation
pub struct RowValidator;

/// Upper bound for plausible gas exchange values (mL/min)
const MAX_GAS_ML_MIN: f64 = 10_000.0;
/// Upper bound for a plausible body mass (kg)
const MAX_BODY_MASS_KG: f64 = 400.0;
/// Upper bound for a plausible running speed (m/s)
const MAX_SPEED_M_PER_S: f64 = 15.0;

impl RowValidator {
    /// Validate a VO2 or VCO2 value, returning the reason it was rejected
    pub fn validate_gas(name: &str, value: f64) -> Result<f64, String> {
        if !value.is_finite() {
            return Err(format!("{} is not a finite number", name));
        }
        if value < 0.0 {
            return Err(format!("{} cannot be negative, got {}", name, value));
        }
        if value > MAX_GAS_ML_MIN {
            return Err(format!(
                "{} of {} mL/min exceeds physiological range",
                name, value
            ));
        }
        Ok(value)
    }

    pub fn validate_time(value: f64) -> Result<f64, String> {
        if !value.is_finite() {
            return Err("time is not a finite number".to_string());
        }
        if value < 0.0 {
            return Err(format!("time cannot be negative, got {}", value));
        }
        Ok(value)
    }

    /// Body mass is optional per row; an implausible value is dropped, not fatal.
    pub fn clean_body_mass(value: Option<f64>) -> Option<f64> {
        value.filter(|mass| mass.is_finite() && *mass > 0.0 && *mass <= MAX_BODY_MASS_KG)
    }

    pub fn clean_speed(value: Option<f64>) -> Option<f64> {
        value.filter(|speed| speed.is_finite() && *speed >= 0.0 && *speed <= MAX_SPEED_M_PER_S)
    }
}
