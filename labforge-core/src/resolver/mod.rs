//! Turns a pair of substances into a reaction outcome: remote inference
//! first, the local table when the remote side fails in any way.

pub mod local;
pub mod outcome;
pub mod remote;

use self::{
    local::{rule_to_outcome, ReactionTable},
    remote::{InferenceClient, InferenceError, InferenceRequest, OfflineClient},
};
use labforge_schemas::{chemical::ChemicalQuantity, reaction::ReactionOutcome};

/// A reaction check queued by the engine for one container.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRequest {
    pub ticket: u64,
    pub container_id: String,
    pub chemical_a: ChemicalQuantity,
    pub chemical_b: ChemicalQuantity,
    /// Catalog identifiers (formula when known) of the two quantities.
    pub identifier_a: String,
    pub identifier_b: String,
    pub temperature: f64,
}

impl ResolutionRequest {
    pub fn inference_request(&self) -> InferenceRequest {
        InferenceRequest {
            chemical_a: self.chemical_a.name.clone(),
            chemical_b: self.chemical_b.name.clone(),
            volume_a: self.chemical_a.volume,
            volume_b: self.chemical_b.volume,
        }
    }

    pub fn combined_volume(&self) -> f64 {
        self.chemical_a.volume + self.chemical_b.volume
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Reacted(ReactionOutcome),
    NoReaction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionReport {
    pub ticket: u64,
    pub container_id: String,
    pub resolution: Resolution,
    /// Why the remote side was bypassed, when it was.
    pub remote_error: Option<InferenceError>,
}

pub struct ReactionResolver<C: InferenceClient> {
    client: C,
    table: ReactionTable,
}

impl ReactionResolver<OfflineClient> {
    /// A resolver that only consults the local table.
    pub fn offline(table: ReactionTable) -> Self {
        Self::new(OfflineClient, table)
    }
}

impl<C: InferenceClient> ReactionResolver<C> {
    pub fn new(client: C, table: ReactionTable) -> Self {
        Self { client, table }
    }

    pub fn table(&self) -> &ReactionTable {
        &self.table
    }

    pub fn resolve(&self, request: &ResolutionRequest) -> ResolutionReport {
        let remote_error = match self.resolve_remote(request) {
            Ok(resolution) => {
                return ResolutionReport {
                    ticket: request.ticket,
                    container_id: request.container_id.clone(),
                    resolution,
                    remote_error: None,
                }
            }
            Err(err) => err,
        };

        if remote_error != InferenceError::Disabled {
            eprintln!(
                "[Resolver] Remote resolution for '{}' failed ({}); using the local reaction table.",
                request.container_id, remote_error
            );
        }

        ResolutionReport {
            ticket: request.ticket,
            container_id: request.container_id.clone(),
            resolution: self.resolve_local(request),
            remote_error: Some(remote_error),
        }
    }

    fn resolve_remote(&self, request: &ResolutionRequest) -> Result<Resolution, InferenceError> {
        let raw = self.client.infer(&request.inference_request())?;
        let outcome = outcome::parse_outcome(&raw, request.chemical_a.volume, request.chemical_b.volume)?;
        Ok(if outcome.reacts {
            Resolution::Reacted(outcome)
        } else {
            Resolution::NoReaction
        })
    }

    /// Looks the pair up by identifier and by display name.
    pub fn resolve_local(&self, request: &ResolutionRequest) -> Resolution {
        let candidates_a = [request.identifier_a.as_str(), request.chemical_a.name.as_str()];
        let candidates_b = [request.identifier_b.as_str(), request.chemical_b.name.as_str()];
        match self.table.lookup(&candidates_a, &candidates_b, request.temperature) {
            Some(rule) => Resolution::Reacted(rule_to_outcome(rule, request.combined_volume())),
            None => Resolution::NoReaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labforge_schemas::reaction::OutcomeSource;
    use std::cell::Cell;

    struct MockClient {
        response: Result<String, InferenceError>,
        calls: Cell<usize>,
    }

    impl MockClient {
        fn new(response: Result<String, InferenceError>) -> Self {
            Self {
                response,
                calls: Cell::new(0),
            }
        }
    }

    impl InferenceClient for MockClient {
        fn infer(&self, _request: &InferenceRequest) -> Result<String, InferenceError> {
            self.calls.set(self.calls.get() + 1);
            self.response.clone()
        }
    }

    fn request(temperature: f64) -> ResolutionRequest {
        ResolutionRequest {
            ticket: 1,
            container_id: "beaker-1".to_string(),
            chemical_a: ChemicalQuantity::new("Hydrochloric Acid", 50.0, "#FFD700"),
            chemical_b: ChemicalQuantity::new("Sodium Hydroxide", 50.0, "#87CEEB"),
            identifier_a: "HCl".to_string(),
            identifier_b: "NaOH".to_string(),
            temperature,
        }
    }

    #[test]
    fn remote_success_is_used_as_is() {
        let client = MockClient::new(Ok(
            r#"{"reactionName": "Remote Neutralization", "reacts": true, "energy": 40}"#.to_string(),
        ));
        let resolver = ReactionResolver::new(client, ReactionTable::builtin());
        let report = resolver.resolve(&request(20.0));
        let Resolution::Reacted(outcome) = report.resolution else {
            panic!("expected a reaction");
        };
        assert_eq!(outcome.reaction_name, "Remote Neutralization");
        assert_eq!(outcome.source, OutcomeSource::Remote);
        assert!(report.remote_error.is_none());
    }

    #[test]
    fn remote_no_reaction_skips_the_table() {
        let client = MockClient::new(Ok(r#"{"reactionName": "None", "reacts": false}"#.to_string()));
        let resolver = ReactionResolver::new(client, ReactionTable::builtin());
        let report = resolver.resolve(&request(20.0));
        assert_eq!(report.resolution, Resolution::NoReaction);
        assert!(report.remote_error.is_none());
    }

    #[test]
    fn timeout_falls_back_to_table() {
        let client = MockClient::new(Err(InferenceError::Timeout {
            message: "deadline".to_string(),
        }));
        let resolver = ReactionResolver::new(client, ReactionTable::builtin());
        let report = resolver.resolve(&request(20.0));
        let Resolution::Reacted(outcome) = report.resolution else {
            panic!("expected the table reaction");
        };
        assert_eq!(outcome.reaction_name, "Acid-Base Neutralization");
        assert_eq!(outcome.output_volume, 100.0);
        assert!(matches!(report.remote_error, Some(InferenceError::Timeout { .. })));
    }

    #[test]
    fn malformed_json_falls_back_to_table() {
        let client = MockClient::new(Ok("```json\n{ not json\n```".to_string()));
        let resolver = ReactionResolver::new(client, ReactionTable::builtin());
        let report = resolver.resolve(&request(25.0));
        assert!(matches!(report.resolution, Resolution::Reacted(_)));
        assert!(matches!(report.remote_error, Some(InferenceError::Malformed(_))));
    }

    #[test]
    fn cold_fallback_is_no_reaction() {
        let resolver = ReactionResolver::offline(ReactionTable::builtin());
        let report = resolver.resolve(&request(15.0));
        assert_eq!(report.resolution, Resolution::NoReaction);
        assert_eq!(report.remote_error, Some(InferenceError::Disabled));
    }
}
