use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification label assigned to a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Not subject to counting: unparseable identity, private address space.
    Unknown,
    /// Credential or authentication probing.
    AuthEnumeration,
    /// Catch-all for otherwise unclassified public traffic.
    Spam,
    /// Known crawler or automation user agent.
    Crawler,
}

impl Category {
    /// The categories that are counted by the reputation store.
    pub const MALICIOUS: [Category; 3] =
        [Category::AuthEnumeration, Category::Spam, Category::Crawler];

    /// Label value used in metrics and logs.
    pub fn as_label(self) -> &'static str {
        match self {
            Category::Unknown => "unknown",
            Category::AuthEnumeration => "auth_enumeration",
            Category::Spam => "spam",
            Category::Crawler => "crawler",
        }
    }

    pub fn is_malicious(self) -> bool {
        self != Category::Unknown
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// One value per malicious category.
///
/// Used both for request counters and for the per-category thresholds of the
/// blocking policy. Looking up [`Category::Unknown`] yields `T::default()`
/// and writes to it are ignored, since unknown requests are never counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerCategory<T> {
    pub auth_enumeration: T,
    pub spam: T,
    pub crawler: T,
}

impl<T: Copy + Default> PerCategory<T> {
    pub fn new(auth_enumeration: T, spam: T, crawler: T) -> Self {
        Self {
            auth_enumeration,
            spam,
            crawler,
        }
    }

    pub fn get(&self, category: Category) -> T {
        match category {
            Category::AuthEnumeration => self.auth_enumeration,
            Category::Spam => self.spam,
            Category::Crawler => self.crawler,
            Category::Unknown => T::default(),
        }
    }

    pub fn get_mut(&mut self, category: Category) -> Option<&mut T> {
        match category {
            Category::AuthEnumeration => Some(&mut self.auth_enumeration),
            Category::Spam => Some(&mut self.spam),
            Category::Crawler => Some(&mut self.crawler),
            Category::Unknown => None,
        }
    }

    /// Iterate `(category, value)` pairs in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, T)> + '_ {
        Category::MALICIOUS.into_iter().map(|c| (c, self.get(c)))
    }
}

impl PerCategory<u64> {
    /// Sum across all categories.
    pub fn total(&self) -> u64 {
        self.auth_enumeration
            .saturating_add(self.spam)
            .saturating_add(self.crawler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Category::AuthEnumeration.as_label(), "auth_enumeration");
        assert_eq!(Category::Spam.to_string(), "spam");
        assert!(!Category::Unknown.is_malicious());
        assert!(Category::Crawler.is_malicious());
    }

    #[test]
    fn test_unknown_is_not_stored() {
        let mut counts = PerCategory::<u64>::default();
        assert!(counts.get_mut(Category::Unknown).is_none());
        *counts.get_mut(Category::Spam).unwrap() += 3;
        assert_eq!(counts.get(Category::Spam), 3);
        assert_eq!(counts.get(Category::Unknown), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_iter_order() {
        let table = PerCategory::new(1u64, 2, 3);
        let pairs: Vec<_> = table.iter().collect();
        assert_eq!(
            pairs,
            vec![
                (Category::AuthEnumeration, 1),
                (Category::Spam, 2),
                (Category::Crawler, 3)
            ]
        );
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Category::AuthEnumeration).unwrap();
        assert_eq!(json, "\"auth_enumeration\"");
    }
}
