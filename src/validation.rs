use crate::service::ServiceError;

pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ServiceError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ServiceError::InvalidField(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

pub fn check_email(value: &str) -> Result<(), ServiceError> {
    check_length("email", value, 3, 254)?;
    let Some((local, domain)) = value.split_once('@') else {
        return Err(ServiceError::InvalidField("invalid email address".into()));
    };
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || value.chars().any(char::is_whitespace)
    {
        return Err(ServiceError::InvalidField("invalid email address".into()));
    }
    Ok(())
}

pub fn check_password(value: &str) -> Result<(), ServiceError> {
    check_length("password", value, 1, 1024)
}
