use oxgit_types::Oid;
use serde::{Deserialize, Serialize};

/// One reference advertised by a connected remote.
///
/// Produced fresh for every `list` call on a live connection and never
/// persisted. Equality is structural.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteHead {
    /// The advertised object already exists in the local object database.
    pub is_local: bool,
    pub oid: Oid,
    /// Local value of the tracking reference this head maps to, or the zero
    /// id when no fetch refspec maps it or the tracking ref is absent.
    pub local_oid: Oid,
    pub name: String,
}

impl RemoteHead {
    /// Whether this entry is the peeled value of an annotated tag
    /// (`refs/tags/v1^{}`).
    pub fn is_peeled(&self) -> bool {
        self.name.ends_with("^{}")
    }

    /// The local tracking ref is behind or absent.
    pub fn needs_update(&self) -> bool {
        self.local_oid != self.oid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let head = RemoteHead {
            is_local: true,
            oid: Oid::from_hex("b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0").unwrap(),
            local_oid: Oid::zero(),
            name: "refs/heads/main".into(),
        };
        let json = serde_json::to_value(&head).unwrap();
        assert_eq!(json["oid"], "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
        assert_eq!(json["local_oid"], "0000000000000000000000000000000000000000");
        assert_eq!(json["is_local"], true);
        assert!(head.needs_update());
        assert!(!head.is_peeled());
    }
}
