//! Enrichment orchestrator: details → summary → tags → type → recommendations.

use std::sync::Arc;

use crate::analysis::StoreAnalyzer;
use crate::error::Result;
use crate::models::EnrichedStore;
use crate::places::PlaceDirectory;

/// Assembles a normalized [`EnrichedStore`] for a selected candidate.
///
/// The four AI-derived fields are independent calls, run sequentially;
/// if any one fails the whole enrichment fails and nothing partial is
/// surfaced. Correctness over latency: this is deliberately not
/// parallelized.
#[derive(Clone)]
pub struct EnrichmentOrchestrator {
    places: Arc<dyn PlaceDirectory>,
    analyzer: Arc<dyn StoreAnalyzer>,
}

impl EnrichmentOrchestrator {
    pub fn new(places: Arc<dyn PlaceDirectory>, analyzer: Arc<dyn StoreAnalyzer>) -> Self {
        Self { places, analyzer }
    }

    pub async fn enrich(&self, place_id: &str) -> Result<EnrichedStore> {
        let details = self.places.details(place_id).await?;
        tracing::debug!(place_id, name = %details.name, "enriching store");

        let summary = self.analyzer.summarize_reviews(&details.reviews).await?;
        let tags = self
            .analyzer
            .classify_tags(&details.name, &details.category_hints, &summary)
            .await?;
        let store_type = self
            .analyzer
            .infer_store_type(&details.category_hints, &summary)
            .await?;
        let recommendations = self
            .analyzer
            .infer_recommendations(&details.category_hints, &summary, &details.name)
            .await?;

        Ok(EnrichedStore {
            details,
            summary,
            tags,
            store_type,
            recommendations,
            comment: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UmamiError;
    use crate::models::{Candidate, GeoPoint, PlaceDetails, Review, StoreType};
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    struct FakeDirectory {
        details: PlaceDetails,
    }

    #[async_trait]
    impl PlaceDirectory for FakeDirectory {
        async fn search(&self, _query: &str) -> Result<Vec<Candidate>> {
            Ok(Vec::new())
        }

        async fn details(&self, place_id: &str) -> Result<PlaceDetails> {
            if place_id == self.details.place_id {
                Ok(self.details.clone())
            } else {
                Err(UmamiError::NotFound(format!("unknown place {place_id}")))
            }
        }

        async fn geocode(&self, _address: &str) -> Result<GeoPoint> {
            Ok(GeoPoint::new(0.0, 0.0))
        }
    }

    struct FakeAnalyzer {
        fail_tags: bool,
    }

    #[async_trait]
    impl StoreAnalyzer for FakeAnalyzer {
        async fn summarize_reviews(&self, reviews: &[Review]) -> Result<String> {
            Ok(format!("summary of {} reviews", reviews.len()))
        }

        async fn classify_tags(
            &self,
            _name: &str,
            _hints: &[String],
            _summary: &str,
        ) -> Result<BTreeSet<String>> {
            if self.fail_tags {
                Err(UmamiError::Llm("tags failed".into()))
            } else {
                Ok(BTreeSet::from(["カフェ".to_string()]))
            }
        }

        async fn infer_store_type(&self, _hints: &[String], _summary: &str) -> Result<StoreType> {
            Ok(StoreType {
                kind: "cafe".into(),
                subtype: "静かな喫茶店".into(),
            })
        }

        async fn infer_recommendations(
            &self,
            _hints: &[String],
            _summary: &str,
            _name: &str,
        ) -> Result<Vec<String>> {
            Ok(vec!["ブレンド".into(), "チーズケーキ".into()])
        }
    }

    fn sample_details() -> PlaceDetails {
        PlaceDetails {
            place_id: "p1".into(),
            name: "喫茶ソクラテス".into(),
            reviews: vec![Review {
                text: "落ち着く".into(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_enrich_assembles_all_fields() {
        let orchestrator = EnrichmentOrchestrator::new(
            Arc::new(FakeDirectory {
                details: sample_details(),
            }),
            Arc::new(FakeAnalyzer { fail_tags: false }),
        );

        let enriched = orchestrator.enrich("p1").await.unwrap();
        assert_eq!(enriched.details.name, "喫茶ソクラテス");
        assert_eq!(enriched.summary, "summary of 1 reviews");
        assert!(enriched.tags.contains("カフェ"));
        assert_eq!(enriched.store_type.kind, "cafe");
        assert_eq!(enriched.recommendations.len(), 2);
        assert!(enriched.comment.is_none());
    }

    #[tokio::test]
    async fn test_single_failure_fails_whole_enrichment() {
        let orchestrator = EnrichmentOrchestrator::new(
            Arc::new(FakeDirectory {
                details: sample_details(),
            }),
            Arc::new(FakeAnalyzer { fail_tags: true }),
        );

        let err = orchestrator.enrich("p1").await.unwrap_err();
        assert!(matches!(err, UmamiError::Llm(_)));
    }

    #[tokio::test]
    async fn test_unknown_place_id_is_not_found() {
        let orchestrator = EnrichmentOrchestrator::new(
            Arc::new(FakeDirectory {
                details: sample_details(),
            }),
            Arc::new(FakeAnalyzer { fail_tags: false }),
        );

        let err = orchestrator.enrich("missing").await.unwrap_err();
        assert!(matches!(err, UmamiError::NotFound(_)));
    }
}
