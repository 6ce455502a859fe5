//! Distance and recommendation scoring.
//!
//! Pure functions: given details already fetched from the record store
//! and a user position, produce a composite 0–100 score and a ranked
//! top-3. No I/O here.

use crate::models::StoredRecord;

const EARTH_RADIUS_KM: f64 = 6_371.0;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

const WEIGHT_RATING: f64 = 0.40;
const WEIGHT_SITUATION: f64 = 0.30;
const WEIGHT_DISTANCE: f64 = 0.15;
const WEIGHT_PERSONAL: f64 = 0.10;
const WEIGHT_TYPE_MATCH: f64 = 0.05;

/// Situation label → keyword set used for the situation-fit component.
/// Exact match on the label; Japanese aliases map to the same sets.
const SITUATION_KEYWORDS: &[(&str, &[&str])] = &[
    ("date", &["date", "romantic", "couple"]),
    ("デート", &["date", "romantic", "couple"]),
    ("quiet", &["quiet", "study", "relax"]),
    ("静か", &["quiet", "study", "relax"]),
    ("work", &["work", "study", "focus"]),
    ("仕事", &["work", "study", "focus"]),
    ("solo", &["solo", "casual", "quiet"]),
    ("一人", &["solo", "casual", "quiet"]),
    ("friends", &["friends", "group", "fun"]),
    ("友達", &["friends", "group", "fun"]),
];

fn situation_keywords(situation: &str) -> &'static [&'static str] {
    SITUATION_KEYWORDS
        .iter()
        .find(|(label, _)| *label == situation)
        .map(|(_, set)| *set)
        .unwrap_or(&[])
}

/// Great-circle distance in kilometers (sphere radius 6,371 km).
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    haversine(lat1, lng1, lat2, lng2, EARTH_RADIUS_KM)
}

/// Great-circle distance in meters (sphere radius 6,371,000 m).
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    haversine(lat1, lng1, lat2, lng2, EARTH_RADIUS_M)
}

fn haversine(lat1: f64, lng1: f64, lat2: f64, lng2: f64, radius: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    radius * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Composite recommendation score in [0, 100].
///
/// Weighted sum of five components: directory rating (0.40),
/// situation fit (0.30), distance step (0.15), personal rating (0.10)
/// and type-in-tags match (0.05).
pub fn recommendation_score(record: &StoredRecord, user_lat: f64, user_lng: f64, situation: &str) -> f64 {
    let rating_component = (record.rating.unwrap_or(0.0) * 20.0).clamp(0.0, 100.0);

    let subtype = record.store_type.subtype.as_str();
    let keywords = situation_keywords(situation);
    let situation_component = if keywords.contains(&subtype) {
        100.0
    } else if keywords.iter().any(|k| subtype.contains(k)) || (!situation.is_empty() && subtype.contains(situation)) {
        50.0
    } else {
        30.0
    };

    let distance_component = match record.location {
        Some(loc) => distance_step(haversine_m(user_lat, user_lng, loc.lat, loc.lng)),
        // No coordinates stored: treat as far away.
        None => 15.0,
    };

    let personal_component = (record.personal_rating.unwrap_or(0.0) * 20.0).clamp(0.0, 100.0);

    let type_component = if record.tags.contains(&record.store_type.kind) {
        100.0
    } else {
        50.0
    };

    let score = rating_component * WEIGHT_RATING
        + situation_component * WEIGHT_SITUATION
        + distance_component * WEIGHT_DISTANCE
        + personal_component * WEIGHT_PERSONAL
        + type_component * WEIGHT_TYPE_MATCH;

    score.clamp(0.0, 100.0)
}

/// Step function of meters: near places saturate at 100, far places
/// decay hyperbolically with a floor of 15.
fn distance_step(meters: f64) -> f64 {
    if meters <= 100.0 {
        100.0
    } else if meters <= 300.0 {
        80.0
    } else if meters <= 600.0 {
        60.0
    } else if meters <= 1000.0 {
        40.0
    } else {
        (10_000.0 / meters).max(15.0)
    }
}

/// A record with its computed score, preserving store order for ties.
#[derive(Debug, Clone)]
pub struct RankedRecord {
    pub record: StoredRecord,
    pub score: f64,
    pub distance_km: f64,
}

/// Rank records by descending score and take the top 3. The sort is
/// stable, so ties keep the record store's original order.
pub fn rank_nearby(
    records: Vec<StoredRecord>,
    user_lat: f64,
    user_lng: f64,
    situation: &str,
) -> Vec<RankedRecord> {
    let mut scored: Vec<RankedRecord> = records
        .into_iter()
        .map(|record| {
            let score = recommendation_score(&record, user_lat, user_lng, situation);
            let distance_km = record
                .location
                .map(|loc| haversine_km(user_lat, user_lng, loc.lat, loc.lng))
                .unwrap_or(f64::INFINITY);
            RankedRecord {
                record,
                score,
                distance_km,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(3);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, StoreType, StoredRecord};

    fn record_at(lat: f64, lng: f64) -> StoredRecord {
        StoredRecord {
            location: Some(GeoPoint::new(lat, lng)),
            ..Default::default()
        }
    }

    #[test]
    fn test_haversine_identity_is_zero() {
        assert_eq!(haversine_m(35.6812, 139.7671, 35.6812, 139.7671), 0.0);
        assert_eq!(haversine_km(35.6812, 139.7671, 35.6812, 139.7671), 0.0);
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = haversine_m(35.6812, 139.7671, 34.7025, 135.4959);
        let b = haversine_m(34.7025, 135.4959, 35.6812, 139.7671);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_tokyo_osaka() {
        // Tokyo Station to Osaka Station is roughly 400 km.
        let km = haversine_km(35.6812, 139.7671, 34.7025, 135.4959);
        assert!((390.0..=410.0).contains(&km), "got {km}");

        let m = haversine_m(35.6812, 139.7671, 34.7025, 135.4959);
        assert!((m / 1000.0 - km).abs() < 1e-6);
    }

    #[test]
    fn test_distance_step_boundaries() {
        assert_eq!(distance_step(50.0), 100.0);
        assert_eq!(distance_step(100.0), 100.0);
        assert_eq!(distance_step(300.0), 80.0);
        assert_eq!(distance_step(600.0), 60.0);
        assert_eq!(distance_step(1000.0), 40.0);
        assert_eq!(distance_step(2000.0), 15.0);
        assert!((distance_step(500_000.0) - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_situation_exact_membership_scores_100() {
        let mut record = record_at(35.0, 139.0);
        record.store_type = StoreType {
            kind: "cafe".into(),
            subtype: "date".into(),
        };
        // Subtype is a member of the デート keyword set.
        let score = recommendation_score(&record, 35.0, 139.0, "デート");
        // rating 0, distance 100, personal 0, type 50:
        // 0*.4 + 100*.3 + 100*.15 + 0*.1 + 50*.05 = 47.5
        assert!((score - 47.5).abs() < 1e-9);
    }

    #[test]
    fn test_situation_unrelated_scores_30() {
        let mut record = record_at(35.0, 139.0);
        record.store_type = StoreType {
            kind: "cafe".into(),
            subtype: "焼肉の店".into(),
        };
        let score = recommendation_score(&record, 35.0, 139.0, "デート");
        // situation component 30 instead of 100: 47.5 - 70*.3 = 26.5
        assert!((score - 26.5).abs() < 1e-9);
    }

    #[test]
    fn test_situation_substring_scores_50() {
        let mut record = record_at(35.0, 139.0);
        record.store_type = StoreType {
            kind: "bar".into(),
            subtype: "romantic dinner spot".into(),
        };
        let score = recommendation_score(&record, 35.0, 139.0, "date");
        // situation component 50: 0*.4 + 50*.3 + 100*.15 + 0*.1 + 50*.05 = 32.5
        assert!((score - 32.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_within_bounds_at_extremes() {
        let mut record = record_at(35.0, 139.0);
        record.rating = Some(5.0);
        record.personal_rating = Some(5.0);
        record.store_type = StoreType {
            kind: "cafe".into(),
            subtype: "date".into(),
        };
        record.tags.insert("cafe".into());

        let high = recommendation_score(&record, 35.0, 139.0, "date");
        assert!((0.0..=100.0).contains(&high));
        assert!((high - 100.0).abs() < 1e-9);

        let empty = StoredRecord::default();
        let low = recommendation_score(&empty, 35.0, 139.0, "date");
        assert!((0.0..=100.0).contains(&low));
    }

    #[test]
    fn test_type_in_tags_component() {
        let mut record = record_at(35.0, 139.0);
        record.store_type.kind = "cafe".into();
        let without = recommendation_score(&record, 35.0, 139.0, "");
        record.tags.insert("cafe".into());
        let with = recommendation_score(&record, 35.0, 139.0, "");
        assert!((with - without - 50.0 * 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_rank_nearby_stable_and_top3() {
        let mut far = record_at(36.0, 140.0);
        far.name = "far".into();
        let mut near_a = record_at(35.0001, 139.0001);
        near_a.name = "near_a".into();
        let mut near_b = record_at(35.0001, 139.0001);
        near_b.name = "near_b".into();
        let mut near_c = record_at(35.0001, 139.0001);
        near_c.name = "near_c".into();

        let ranked = rank_nearby(vec![far, near_a, near_b, near_c], 35.0, 139.0, "");
        assert_eq!(ranked.len(), 3);
        // Identical scores keep input order; the far record falls out.
        assert_eq!(ranked[0].record.name, "near_a");
        assert_eq!(ranked[1].record.name, "near_b");
        assert_eq!(ranked[2].record.name, "near_c");
    }

    #[test]
    fn test_unknown_situation_falls_back_to_substring() {
        let mut record = record_at(35.0, 139.0);
        record.store_type.subtype = "昼飲みできる店".into();
        let score = recommendation_score(&record, 35.0, 139.0, "昼飲み");
        // Unknown label, but label is a substring of subtype → 50.
        // 0*.4 + 50*.3 + 100*.15 + 0*.1 + 50*.05 = 32.5
        assert!((score - 32.5).abs() < 1e-9);
    }
}
