use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::{required, PersonName},
    db::NewCandidate,
};

/// A candidate registration request. The party is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CandidateRegistration {
    pub name: Option<String>,
    pub party: Option<String>,
}

impl TryFrom<CandidateRegistration> for NewCandidate {
    type Error = Error;

    fn try_from(req: CandidateRegistration) -> Result<Self, Self::Error> {
        let name = PersonName::parse(&required("name", req.name)?)?;
        // A blank party is the same as no party.
        let party = req
            .party
            .map(|party| party.trim().to_string())
            .filter(|party| !party.is_empty());
        Ok(NewCandidate::new(name, party))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_is_optional() {
        let candidate = NewCandidate::try_from(CandidateRegistration {
            name: Some(" Ana ".into()),
            party: Some("X".into()),
        })
        .unwrap();
        assert_eq!(candidate, NewCandidate::example());

        let candidate = NewCandidate::try_from(CandidateRegistration {
            name: Some("Diego".into()),
            party: Some("  ".into()),
        })
        .unwrap();
        assert_eq!(candidate.party, None);
    }

    #[test]
    fn name_is_required() {
        let err = NewCandidate::try_from(CandidateRegistration::default()).unwrap_err();
        assert_eq!(err.to_string(), "name is required");
    }
}
