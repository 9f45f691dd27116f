use crate::domain::error::AuthError;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn require_sign_in_input(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.trim().is_empty() {
        return Err(AuthError::InvalidInput("Email and password are required."));
    }

    Ok(())
}

pub fn require_reset_input(email: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::InvalidInput("Email is required."));
    }

    Ok(())
}

pub fn require_registration_input(form: &RegistrationForm) -> Result<(), AuthError> {
    if form.full_name.trim().chars().count() < MIN_NAME_LEN {
        return Err(AuthError::InvalidInput(
            "Name must be at least 2 characters long",
        ));
    }

    if !is_plausible_email(&form.email) {
        return Err(AuthError::InvalidInput("Invalid email format"));
    }

    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(
            "Password must be at least 6 characters long",
        ));
    }

    if form.password != form.confirm_password {
        return Err(AuthError::InvalidInput("Passwords do not match"));
    }

    Ok(())
}

/// Shape check only: one `@`, non-empty local part, dotted domain, no spaces.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            full_name: "Ada Lovelace".to_owned(),
            email: "ada@example.com".to_owned(),
            phone_number: String::new(),
            password: "secret1".to_owned(),
            confirm_password: "secret1".to_owned(),
        }
    }

    #[test]
    fn accepts_valid_registration() {
        assert_eq!(require_registration_input(&form()), Ok(()));
    }

    #[test]
    fn rejects_short_name() {
        let form = RegistrationForm {
            full_name: "A".to_owned(),
            ..form()
        };
        assert_eq!(
            require_registration_input(&form),
            Err(AuthError::InvalidInput(
                "Name must be at least 2 characters long"
            ))
        );
    }

    #[test]
    fn rejects_mismatched_passwords() {
        let form = RegistrationForm {
            confirm_password: "secret2".to_owned(),
            ..form()
        };
        assert_eq!(
            require_registration_input(&form),
            Err(AuthError::InvalidInput("Passwords do not match"))
        );
    }

    #[test]
    fn rejects_short_password() {
        let form = RegistrationForm {
            password: "abc".to_owned(),
            confirm_password: "abc".to_owned(),
            ..form()
        };
        assert_eq!(
            require_registration_input(&form),
            Err(AuthError::InvalidInput(
                "Password must be at least 6 characters long"
            ))
        );
    }

    #[test]
    fn email_shapes() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.co"));
        assert!(!is_plausible_email("a@@b.co"));
        assert!(!is_plausible_email("a b@c.co"));
        assert!(!is_plausible_email("a@.co"));
    }

    #[test]
    fn blank_sign_in_rejected() {
        assert!(require_sign_in_input("  ", "pw").is_err());
        assert!(require_sign_in_input("a@b.co", "").is_err());
        assert!(require_reset_input("").is_err());
        assert_eq!(require_sign_in_input("a@b.co", "pw"), Ok(()));
    }
}
