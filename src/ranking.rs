//! # Merge & Rank Engine Module
//!
//! ## Purpose
//! Applies domain-specific score boosts to search results and produces the
//! final ordering: a primacy boost for cross-border authorities, a freshness
//! boost for recently issued documents and an importance boost keyed by the
//! classified importance level.
//!
//! ## Input/Output Specification
//! - **Input**: National and/or cross-border result sets, scope
//! - **Output**: Deduplicated results ordered by boosted score
//! - **Invariants**: Boosts are additive and order-independent; the final
//!   score is clamped to 1.0 and rounded to 4 decimals
//!
//! ## Key Features
//! - Scope-driven result-set selection
//! - Unparsable issue dates get no freshness boost (logged, not an error)
//! - Dedup by document id keeping the highest-scored instance

use crate::config::RankingConfig;
use crate::search::SearchHit;
use crate::utils::round_score;
use crate::Scope;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;

/// Importance boosts by level: 1 is landmark, 3 is routine
fn importance_boost(level: u8) -> f32 {
    match level {
        1 => 0.03,
        2 => 0.01,
        _ => 0.0,
    }
}

/// Boost application and final ordering
pub struct MergeRankEngine {
    config: RankingConfig,
}

impl MergeRankEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Merge the result sets implied by `scope`, boost, dedup and order them
    pub fn merge_and_rank(
        &self,
        national: Vec<SearchHit>,
        cross_border: Vec<SearchHit>,
        scope: Scope,
    ) -> Vec<SearchHit> {
        let selected = match scope {
            Scope::National => national,
            Scope::CrossBorder => cross_border,
            Scope::All => {
                let mut merged = national;
                merged.extend(cross_border);
                merged
            }
        };

        self.apply_boosts(selected)
    }

    /// Boost, dedup and order a single result set.
    ///
    /// Exposed separately for single-collection re-ranking without a merge.
    pub fn apply_boosts(&self, results: Vec<SearchHit>) -> Vec<SearchHit> {
        let today = Utc::now().date_naive();

        let mut best: HashMap<String, SearchHit> = HashMap::new();

        for mut hit in results {
            let boost = self.boost_for(&hit, today);
            hit.score = round_score((hit.score + boost).min(1.0));

            match best.get(&hit.id) {
                Some(existing) if existing.score >= hit.score => {}
                _ => {
                    best.insert(hit.id.clone(), hit);
                }
            }
        }

        let mut ranked: Vec<SearchHit> = best.into_values().collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Sum of the three additive boosts for one result
    fn boost_for(&self, hit: &SearchHit, today: NaiveDate) -> f32 {
        let mut boost = 0.0;

        if self.config.primacy_sources.contains(&hit.source_id) {
            boost += self.config.primacy_boost;
        }

        if !hit.date_issued.is_empty() {
            match NaiveDate::parse_from_str(&hit.date_issued, "%Y-%m-%d") {
                Ok(issued) => {
                    let age_days = (today - issued).num_days();
                    if (0..=self.config.freshness_window_days).contains(&age_days) {
                        boost += self.config.freshness_boost;
                    }
                }
                Err(_) => {
                    tracing::debug!(
                        external_ref = %hit.external_ref,
                        date = %hit.date_issued,
                        "Unparsable issue date, no freshness boost"
                    );
                }
            }
        }

        boost + importance_boost(hit.importance_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::tests::sample_resolution;

    fn engine() -> MergeRankEngine {
        MergeRankEngine::new(Config::default().ranking)
    }

    fn hit(external_ref: &str, source_id: &str, score: f32) -> SearchHit {
        let resolution = sample_resolution(external_ref, source_id);
        SearchHit {
            id: resolution.id.to_string(),
            title: resolution.title.clone(),
            source_id: resolution.source_id.clone(),
            external_ref: resolution.external_ref.clone(),
            resolution_type: resolution.resolution_type.clone(),
            issuing_body: resolution.issuing_body.clone(),
            jurisdiction: resolution.jurisdiction.clone(),
            date_issued: String::new(),
            status_legal: "vigente".to_string(),
            abstract_ai: String::new(),
            key_holdings: String::new(),
            topics: Vec::new(),
            original_url: String::new(),
            importance_level: 3,
            is_cross_border: false,
            ecli: String::new(),
            celex_number: String::new(),
            impact_analysis: String::new(),
            score,
        }
    }

    #[test]
    fn test_importance_boost_is_monotonic() {
        let engine = engine();

        let mut scores = Vec::new();
        for level in [3u8, 2, 1] {
            let mut h = hit("STS 1/2024", "cendoj", 0.8);
            h.importance_level = level;
            let boosted = engine.apply_boosts(vec![h]);
            scores.push(boosted[0].score);
        }

        // Raising importance from 3 to 1 never decreases the final score.
        assert!(scores[0] <= scores[1]);
        assert!(scores[1] <= scores[2]);
        assert_eq!(scores[0], 0.8);
        assert_eq!(scores[1], 0.81);
        assert_eq!(scores[2], 0.83);
    }

    #[test]
    fn test_score_is_clamped_to_one() {
        let engine = engine();
        let mut h = hit("C-415/11", "tjue", 0.99);
        h.importance_level = 1;
        h.date_issued = Utc::now().date_naive().format("%Y-%m-%d").to_string();

        let boosted = engine.apply_boosts(vec![h]);
        assert_eq!(boosted[0].score, 1.0);
    }

    #[test]
    fn test_primacy_and_freshness_boosts() {
        let engine = engine();

        // Cross-border source issued today: primacy 0.05 + freshness 0.02.
        let mut fresh_eu = hit("C-1/24", "tjue", 0.70);
        fresh_eu.date_issued = Utc::now().date_naive().format("%Y-%m-%d").to_string();

        // National source issued long ago: no boost beyond importance.
        let mut stale_national = hit("STS 2/2020", "cendoj", 0.70);
        stale_national.date_issued = "2020-01-01".to_string();

        let boosted = engine.apply_boosts(vec![fresh_eu, stale_national]);
        assert_eq!(boosted[0].score, 0.77);
        assert_eq!(boosted[1].score, 0.70);
    }

    #[test]
    fn test_unparsable_date_gets_no_freshness_boost() {
        let engine = engine();
        let mut h = hit("STS 3/2024", "cendoj", 0.70);
        h.date_issued = "hace dos semanas".to_string();

        let boosted = engine.apply_boosts(vec![h]);
        assert_eq!(boosted[0].score, 0.70);
    }

    #[test]
    fn test_merge_dedups_by_id_keeping_highest() {
        let engine = engine();
        let a = hit("STS 4/2024", "cendoj", 0.75);
        let mut duplicate = a.clone();
        duplicate.score = 0.60;

        let ranked = engine.merge_and_rank(vec![a], vec![duplicate], Scope::All);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 0.75);
    }

    #[test]
    fn test_scope_selects_result_sets() {
        let engine = engine();
        let national = vec![hit("STS 5/2024", "cendoj", 0.8)];
        let cross_border = vec![hit("C-5/24", "tjue", 0.8)];

        let only_national =
            engine.merge_and_rank(national.clone(), cross_border.clone(), Scope::National);
        assert_eq!(only_national.len(), 1);
        assert_eq!(only_national[0].source_id, "cendoj");

        let only_eu = engine.merge_and_rank(national.clone(), cross_border.clone(), Scope::CrossBorder);
        assert_eq!(only_eu.len(), 1);
        assert_eq!(only_eu[0].source_id, "tjue");

        let all = engine.merge_and_rank(national, cross_border, Scope::All);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_results_sorted_descending() {
        let engine = engine();
        let low = hit("STS 6/2024", "cendoj", 0.60);
        let high = hit("STS 7/2024", "cendoj", 0.90);

        let ranked = engine.apply_boosts(vec![low, high]);
        assert_eq!(ranked[0].external_ref, "STS 7/2024");
        assert!(ranked[0].score >= ranked[1].score);
    }
}
