use crate::domain::responses::Responses;

/// Union any number of response maps.
///
/// `None` parts are skipped. For a question present in several parts the
/// option lists are unioned in order of first appearance. Merging nothing
/// yields an empty map; merging a map with itself yields the same map.
pub fn merge_responses<'a, I>(parts: I) -> Responses
where
    I: IntoIterator<Item = Option<&'a Responses>>,
{
    let mut merged = Responses::new();
    for part in parts.into_iter().flatten() {
        merged.absorb(part);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(pairs: &[(&str, &[&str])]) -> Responses {
        let mut out = Responses::new();
        for (question, options) in pairs {
            out.add_options(question, options.iter().copied());
        }
        out
    }

    #[test]
    fn test_merge_nothing_is_empty() {
        assert!(merge_responses(std::iter::empty()).is_empty());
        assert!(merge_responses([None, None]).is_empty());
    }

    #[test]
    fn test_merge_with_self_is_idempotent() {
        let r = responses(&[("Q1", &["a", "b"]), ("Q2", &["c"])]);
        let merged = merge_responses([Some(&r), Some(&r)]);
        assert_eq!(merged, r);
    }

    #[test]
    fn test_merge_disjoint_keys_is_union() {
        let a = responses(&[("Q1", &["a"])]);
        let b = responses(&[("Q2", &["b", "c"])]);
        let merged = merge_responses([Some(&a), None, Some(&b)]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("Q1").unwrap(), a.get("Q1").unwrap());
        assert_eq!(merged.get("Q2").unwrap(), b.get("Q2").unwrap());
    }

    #[test]
    fn test_merge_shared_key_no_duplicates() {
        let a = responses(&[("Q", &["A"])]);
        let b = responses(&[("Q", &["A", "B"])]);
        let merged = merge_responses([Some(&a), Some(&b)]);

        assert_eq!(merged.get("Q").unwrap(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_merge_commutative_and_associative_as_sets() {
        let a = responses(&[("Q", &["x", "y"]), ("R", &["1"])]);
        let b = responses(&[("Q", &["z", "x"])]);
        let c = responses(&[("R", &["2"]), ("S", &["s"])]);

        let ab = merge_responses([Some(&a), Some(&b)]);
        let ba = merge_responses([Some(&b), Some(&a)]);
        assert!(ab.same_selections(&ba));
        assert_eq!(ab.get("Q").unwrap(), &["x", "y", "z"].map(String::from));
        assert_eq!(ba.get("Q").unwrap(), &["z", "x", "y"].map(String::from));

        let ab_c = merge_responses([Some(&ab), Some(&c)]);
        let bc = merge_responses([Some(&b), Some(&c)]);
        let a_bc = merge_responses([Some(&a), Some(&bc)]);
        assert!(ab_c.same_selections(&a_bc));
    }
}
