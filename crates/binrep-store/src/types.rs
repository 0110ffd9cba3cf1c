/// Page size used when a backend is not configured otherwise (S3's default).
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// One page of a prefix listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing {
    /// Full keys of objects directly matching the listing.
    pub keys: Vec<String>,
    /// Delimiter-terminated prefixes standing in for subdirectories.
    pub common_prefixes: Vec<String>,
    /// More results exist beyond this page.
    pub truncated: bool,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.common_prefixes.is_empty()
    }

    /// Build a page from keys sorted in ascending order.
    ///
    /// Keys not starting with `prefix` are skipped. With a delimiter, every
    /// key whose remainder after `prefix` contains it collapses into the
    /// common prefix ending at its first occurrence. Keys and common
    /// prefixes both count against `max_keys`.
    pub fn paginate<'a, I>(
        sorted_keys: I,
        prefix: &str,
        delimiter: Option<&str>,
        max_keys: usize,
    ) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut page = Listing::default();
        let mut taken = 0usize;

        for key in sorted_keys {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            let common = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| &key[..prefix.len() + idx + d.len()]));

            match common {
                Some(cp) => {
                    if page.common_prefixes.last().map(String::as_str) == Some(cp) {
                        continue;
                    }
                    if taken == max_keys {
                        page.truncated = true;
                        break;
                    }
                    page.common_prefixes.push(cp.to_string());
                }
                None => {
                    if taken == max_keys {
                        page.truncated = true;
                        break;
                    }
                    page.keys.push(key.to_string());
                }
            }
            taken += 1;
        }
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[&str] = &[
        "github.com/yuuki/droot/20171015152508/droot",
        "github.com/yuuki/droot/20171015152508/meta.yml",
        "github.com/yuuki/droot/20171016152508/droot",
        "github.com/yuuki/droot/20171016152508/meta.yml",
        "github.com/yuuki/grabeni/20171016152508/meta.yml",
        "readme.txt",
    ];

    #[test]
    fn delimiter_collapses_subtrees() {
        let page = Listing::paginate(KEYS.iter().copied(), "github.com/yuuki/droot/", Some("/"), 1000);
        assert_eq!(
            page.common_prefixes,
            vec![
                "github.com/yuuki/droot/20171015152508/",
                "github.com/yuuki/droot/20171016152508/",
            ]
        );
        assert!(page.keys.is_empty());
        assert!(!page.truncated);
    }

    #[test]
    fn root_listing_mixes_keys_and_prefixes() {
        let page = Listing::paginate(KEYS.iter().copied(), "", Some("/"), 1000);
        assert_eq!(page.common_prefixes, vec!["github.com/"]);
        assert_eq!(page.keys, vec!["readme.txt"]);
    }

    #[test]
    fn no_delimiter_lists_whole_subtree() {
        let page = Listing::paginate(KEYS.iter().copied(), "github.com/yuuki/droot/20171015152508", None, 1000);
        assert_eq!(page.keys.len(), 2);
        assert!(page.common_prefixes.is_empty());
    }

    #[test]
    fn page_limit_sets_truncated() {
        let page = Listing::paginate(KEYS.iter().copied(), "github.com/", None, 3);
        assert_eq!(page.keys.len(), 3);
        assert!(page.truncated);
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        let page = Listing::paginate(KEYS.iter().copied(), "github.com/yuuki/droot/", Some("/"), 2);
        assert_eq!(page.common_prefixes.len(), 2);
        assert!(!page.truncated);
    }
}
