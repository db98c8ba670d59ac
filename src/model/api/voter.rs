use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::{required, Email, PersonName},
    db::NewVoter,
};

/// A voter registration request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VoterRegistration {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl TryFrom<VoterRegistration> for NewVoter {
    type Error = Error;

    /// Both fields are required; the name must not be blank and the email
    /// must look like an address.
    fn try_from(req: VoterRegistration) -> Result<Self, Self::Error> {
        let name = PersonName::parse(&required("name", req.name)?)?;
        let email = Email::parse(&required("email", req.email)?)?;
        Ok(NewVoter::new(name, email))
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl VoterRegistration {
        pub fn example() -> Self {
            Self {
                name: Some("Bob".into()),
                email: Some("bob@example.com".into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_registration() {
        let voter = NewVoter::try_from(VoterRegistration::example()).unwrap();
        assert_eq!(voter, NewVoter::example());
    }

    #[test]
    fn missing_fields() {
        let err = NewVoter::try_from(VoterRegistration {
            name: None,
            ..VoterRegistration::example()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "name is required");

        let err = NewVoter::try_from(VoterRegistration {
            email: None,
            ..VoterRegistration::example()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn invalid_fields() {
        let err = NewVoter::try_from(VoterRegistration {
            name: Some("   ".into()),
            ..VoterRegistration::example()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = NewVoter::try_from(VoterRegistration {
            email: Some("not-an-email".into()),
            ..VoterRegistration::example()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
