//! Geographic aggregation of the catalog by state and city.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::models::ProjectRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadarSummary {
    pub total_projects: usize,
    pub total_states: usize,
    /// Distinct `(city, state)` pairs.
    pub total_cities: usize,
    pub total_stars: u64,
    pub verified_projects: usize,
    /// Sorted by project count descending, then state name.
    pub states: Vec<StateSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub state: String,
    pub count: usize,
    pub stars: u64,
    pub cities: Vec<CitySummary>,
    /// Slugs of the projects located in this state, in input order.
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitySummary {
    pub city: String,
    pub count: usize,
}

pub fn aggregate(records: &[ProjectRecord]) -> RadarSummary {
    let mut by_state: BTreeMap<&str, (usize, u64, BTreeMap<&str, usize>, Vec<String>)> =
        BTreeMap::new();

    for r in records {
        let slot = by_state
            .entry(r.location_indian_state.as_str())
            .or_insert_with(|| (0, 0, BTreeMap::new(), Vec::new()));
        slot.0 += 1;
        slot.1 += r.stars;
        *slot.2.entry(r.location_city.as_str()).or_insert(0) += 1;
        slot.3.push(r.slug.clone());
    }

    let mut states: Vec<StateSummary> = by_state
        .into_iter()
        .map(|(state, (count, stars, cities, projects))| {
            let mut cities: Vec<CitySummary> = cities
                .into_iter()
                .map(|(city, count)| CitySummary {
                    city: city.to_string(),
                    count,
                })
                .collect();
            cities.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.city.cmp(&b.city)));
            StateSummary {
                state: state.to_string(),
                count,
                stars,
                cities,
                projects,
            }
        })
        .collect();
    states.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.state.cmp(&b.state)));

    let total_cities = records
        .iter()
        .map(|r| (r.location_city.as_str(), r.location_indian_state.as_str()))
        .collect::<HashSet<_>>()
        .len();

    RadarSummary {
        total_projects: records.len(),
        total_states: states.len(),
        total_cities,
        total_stars: records.iter().map(|r| r.stars).sum(),
        verified_projects: records.iter().filter(|r| r.verified).count(),
        states,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;

    #[test]
    fn test_aggregate_counts_and_order() {
        let mut a = record("a", &[], 10, "TN");
        a.location_city = "Chennai".to_string();
        a.verified = true;
        let mut b = record("b", &[], 5, "TN");
        b.location_city = "Chennai".to_string();
        let mut c = record("c", &[], 100, "KA");
        c.location_city = "Bengaluru".to_string();
        let mut d = record("d", &[], 1, "TN");
        d.location_city = "Coimbatore".to_string();

        let summary = aggregate(&[a, b, c, d]);
        assert_eq!(summary.total_projects, 4);
        assert_eq!(summary.total_states, 2);
        assert_eq!(summary.total_cities, 3);
        assert_eq!(summary.total_stars, 116);
        assert_eq!(summary.verified_projects, 1);

        assert_eq!(summary.states[0].state, "TN");
        assert_eq!(summary.states[0].count, 3);
        assert_eq!(summary.states[0].stars, 16);
        assert_eq!(
            summary.states[0].cities[0],
            CitySummary {
                city: "Chennai".to_string(),
                count: 2
            }
        );
        assert_eq!(summary.states[0].projects, vec!["a", "b", "d"]);
        assert_eq!(summary.states[1].state, "KA");
    }

    #[test]
    fn test_same_city_name_in_two_states_counts_twice() {
        let mut a = record("a", &[], 0, "TN");
        a.location_city = "Aurangabad".to_string();
        let mut b = record("b", &[], 0, "BR");
        b.location_city = "Aurangabad".to_string();
        assert_eq!(aggregate(&[a, b]).total_cities, 2);
    }

    #[test]
    fn test_empty_catalog() {
        let summary = aggregate(&[]);
        assert_eq!(summary.total_projects, 0);
        assert!(summary.states.is_empty());
    }
}
