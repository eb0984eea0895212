// src/pagination.rs

use serde::Deserialize;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_SIZE: i64 = 10;

/// Common pagination query parameters with explicit defaulting:
/// page 1, size 10, offset `(page - 1) * size`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        match self.page {
            Some(p) if p > 0 => p,
            _ => DEFAULT_PAGE,
        }
    }

    pub fn size(&self) -> i64 {
        match self.size {
            Some(s) if s > 0 => s,
            _ => DEFAULT_SIZE,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.size()
    }
}

/// Parses a `"field asc|desc"` sort parameter against a whitelist of
/// `(api_field, column)` pairs. Anything not whitelisted is ignored.
pub fn parse_sort(sort: Option<&str>, allowed: &[(&str, &str)]) -> Option<(String, bool)> {
    let sort = sort?;
    let mut parts = sort.split_whitespace();
    let field = parts.next()?;
    let ascending = match parts.next() {
        Some("asc") => true,
        Some("desc") => false,
        _ => return None,
    };
    allowed
        .iter()
        .find(|(api, _)| *api == field)
        .map(|(_, column)| ((*column).to_string(), ascending))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_ten() {
        let q = PageQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.size(), 10);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn offset_has_no_gap_or_overlap() {
        let q = PageQuery {
            page: Some(3),
            size: Some(10),
        };
        assert_eq!(q.offset(), 20);

        let q2 = PageQuery {
            page: Some(2),
            size: Some(7),
        };
        assert_eq!(q2.offset(), 7);
    }

    #[test]
    fn nonpositive_values_fall_back_to_defaults() {
        let q = PageQuery {
            page: Some(0),
            size: Some(-5),
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.size(), 10);
    }

    #[test]
    fn sort_is_whitelisted() {
        let allowed = [("fullName", "full_name"), ("createdAt", "created_at")];
        assert_eq!(
            parse_sort(Some("fullName asc"), &allowed),
            Some(("full_name".to_string(), true))
        );
        assert_eq!(
            parse_sort(Some("createdAt desc"), &allowed),
            Some(("created_at".to_string(), false))
        );
        assert_eq!(parse_sort(Some("password asc"), &allowed), None);
        assert_eq!(parse_sort(Some("fullName sideways"), &allowed), None);
        assert_eq!(parse_sort(None, &allowed), None);
    }
}
