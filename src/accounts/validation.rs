use crate::error::AccountError;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 8;

/// 3 to 20 characters of ASCII letters, digits or underscores.
pub fn validate_username(username: &str) -> Result<(), AccountError> {
    let length = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&length) {
        return Err(AccountError::InvalidUsername("must be 3 to 20 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AccountError::InvalidUsername(
            "only letters, digits and underscores are allowed",
        ));
    }
    Ok(())
}

/// `local@domain.tld` with a purely alphabetic TLD of two or more letters.
pub fn validate_email(email: &str) -> Result<(), AccountError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AccountError::InvalidEmail);
    };

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));

    let Some((host, tld)) = domain.rsplit_once('.') else {
        return Err(AccountError::InvalidEmail);
    };
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());

    if local_ok && host_ok && tld_ok {
        Ok(())
    } else {
        Err(AccountError::InvalidEmail)
    }
}

pub fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(AccountError::WeakPassword("must be at least 8 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AccountError::WeakPassword("needs an uppercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AccountError::WeakPassword("needs a lowercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AccountError::WeakPassword("needs a digit"));
    }
    Ok(())
}

pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), AccountError> {
    validate_username(username)?;
    validate_email(email)?;
    validate_password(password)?;
    if password != confirm_password {
        return Err(AccountError::PasswordMismatch);
    }
    Ok(())
}
