//! URL builders for every dashboard surface the pipelines visit. Pure string
//! construction so each pattern is pinned by a test.

const ANALYTICS: &str = "https://www.semrush.com/analytics";

pub fn organic_positions(db: &str, domain: &str) -> String {
    format!("{ANALYTICS}/organic/positions/?db={db}&q={domain}&searchType=domain")
}

pub fn organic_pages(db: &str, domain: &str) -> String {
    format!("{ANALYTICS}/organic/pages/?db={db}&q={domain}&searchType=domain")
}

pub fn backlinks(domain: &str) -> String {
    format!("{ANALYTICS}/backlinks/backlinks/?q={domain}&searchType=domain")
}

pub fn traffic_overview(domain: &str) -> String {
    format!("{ANALYTICS}/traffic/overview/?q={domain}")
}

pub fn traffic_sources(domain: &str) -> String {
    format!("{ANALYTICS}/traffic/traffic-sources/?q={domain}")
}

pub fn traffic_journey(domain: &str) -> String {
    format!("{ANALYTICS}/traffic/traffic-journey/?q={domain}")
}

/// Advertising research: paid keyword positions with CPC columns.
pub fn adwords_positions(db: &str, domain: &str) -> String {
    format!("{ANALYTICS}/adwords/positions/?db={db}&q={domain}")
}

/// Product-listing-ads positions for e-commerce domains.
pub fn pla_positions(db: &str, domain: &str) -> String {
    format!("{ANALYTICS}/pla/positions/?db={db}&q={domain}")
}

pub fn keyword_overview(db: &str, keyword: &str) -> String {
    format!(
        "{ANALYTICS}/keywordoverview/?db={db}&q={}",
        keyword.replace(' ', "%20")
    )
}

/// Target vs competitors gap view; competitor list is comma-joined.
pub fn keyword_gap(db: &str, target: &str, competitors: &[String]) -> String {
    format!(
        "{ANALYTICS}/keywordgap/?db={db}&q={target}&domains={}&searchType=domain",
        competitors.join(",")
    )
}

pub fn keyword_magic(db: &str, keyword: &str) -> String {
    format!(
        "{ANALYTICS}/keywordmagic/?q={}&db={db}",
        keyword.replace(' ', "%20")
    )
}

/// Maps search for a business; spaces become '+'.
pub fn maps_search(query: &str) -> String {
    format!(
        "https://www.google.com/maps/search/{}",
        query.replace(' ', "+")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organic_positions_carries_db_and_domain() {
        assert_eq!(
            organic_positions("us", "acmecandles.com"),
            "https://www.semrush.com/analytics/organic/positions/?db=us&q=acmecandles.com&searchType=domain"
        );
    }

    #[test]
    fn backlinks_has_no_db_parameter() {
        assert_eq!(
            backlinks("acmecandles.com"),
            "https://www.semrush.com/analytics/backlinks/backlinks/?q=acmecandles.com&searchType=domain"
        );
    }

    #[test]
    fn paid_surfaces_carry_db_and_domain() {
        assert_eq!(
            adwords_positions("us", "wickandco.com"),
            "https://www.semrush.com/analytics/adwords/positions/?db=us&q=wickandco.com"
        );
        assert_eq!(
            pla_positions("us", "wickandco.com"),
            "https://www.semrush.com/analytics/pla/positions/?db=us&q=wickandco.com"
        );
    }

    #[test]
    fn keyword_overview_percent_encodes_spaces() {
        assert_eq!(
            keyword_overview("us", "soy candles"),
            "https://www.semrush.com/analytics/keywordoverview/?db=us&q=soy%20candles"
        );
    }

    #[test]
    fn keyword_gap_joins_competitor_domains() {
        let url = keyword_gap(
            "us",
            "acmecandles.com",
            &["wickandco.com".into(), "glowworks.io".into()],
        );
        assert!(url.contains("q=acmecandles.com"));
        assert!(url.contains("domains=wickandco.com,glowworks.io"));
    }

    #[test]
    fn keyword_magic_percent_encodes_spaces() {
        assert!(keyword_magic("us", "soy candles").contains("q=soy%20candles"));
    }

    #[test]
    fn maps_search_plus_encodes_spaces() {
        assert_eq!(
            maps_search("Wick & Co New York"),
            "https://www.google.com/maps/search/Wick+&+Co+New+York"
        );
    }
}
