//! SPARQL query builders, one per request intent.
//!
//! Every builder is a pure function returning a complete query string. Any
//! caller-supplied text placed inside a quoted literal goes through
//! `safety::quoted`; paging and the trivial-pattern switch are parsed into
//! typed values before they get here.

use crate::errors::QueryError;
use crate::models::{FilterCategory, MatchResult};
use crate::safety::quoted;

/// Page size of the network-visualisation listings.
pub const NUM_NODES: u64 = 5;

/// Row cap of the "most common patterns" listings.
pub const COMMON_PATTERN_LIMIT: u32 = 18;

/// Patterns at or below this complexity are considered trivial.
pub const TRIVIAL_COMPLEXITY: &str = "0.4";

const ELECTRONIC_COLLECTION: &str =
    "<http://w3id.org/polifonia/resource/tunes/CollectionConcept/ElectronicCollection>";

// ============================================================================
// Prefixes
// ============================================================================

const JAMS: &str = "PREFIX jams:<http://w3id.org/polifonia/ontology/jams/>";
const MM: &str = "PREFIX mm:<http://w3id.org/polifonia/ontology/music-meta/>";
const CORE: &str = "PREFIX core:<http://w3id.org/polifonia/ontology/core/>";
const XYZ: &str = "PREFIX xyz:<http://sparql.xyz/facade-x/data/>";
const RDF: &str = "PREFIX rdf:<http://www.w3.org/1999/02/22-rdf-syntax-ns#>";
const TUNES: &str = "PREFIX tunes:<http://w3id.org/polifonia/ontology/tunes/>";
const XSD: &str = "PREFIX xsd:<http://www.w3.org/2001/XMLSchema#>";

fn prologue(prefixes: &[&str]) -> String {
    let mut query = String::new();
    for prefix in prefixes {
        query.push_str(prefix);
        query.push('\n');
    }
    query
}

// ============================================================================
// Parameters
// ============================================================================

/// Zero-based page of a paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub click_num: u64,
}

impl Page {
    pub fn new(click_num: u64) -> Self {
        Self { click_num }
    }

    /// Parse the raw `clickNum` parameter. Negative, fractional or
    /// non-numeric values are rejected, never clamped.
    pub fn from_click(raw: &str) -> Result<Self, QueryError> {
        raw.trim()
            .parse::<u64>()
            .map(Self::new)
            .map_err(|_| QueryError::invalid("clickNum", format!("'{}' is not a non-negative integer", raw)))
    }

    pub fn offset(self) -> u64 {
        NUM_NODES.saturating_mul(self.click_num)
    }

    fn clause(self) -> String {
        format!("OFFSET {} LIMIT {}", self.offset(), NUM_NODES)
    }
}

/// Parse `excludeTrivialPatterns`. Absent means `false`.
pub fn parse_exclude_trivial(raw: Option<&str>) -> Result<bool, QueryError> {
    match raw.map(str::trim) {
        None | Some("") | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(QueryError::invalid(
            "excludeTrivialPatterns",
            format!("expected 'true' or 'false', got '{}'", other),
        )),
    }
}

/// Split a comma-separated multi-value parameter, dropping blanks and repeats.
pub fn split_values(raw: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in raw.split(',').map(str::trim).filter(|v| !v.is_empty()) {
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
    values
}

/// Structured form of an advanced search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedSearch {
    pub title: Option<String>,
    pub pattern: Option<String>,
    pub corpus: Vec<String>,
    pub tune_type: Vec<String>,
    pub key: Vec<String>,
    pub time_signature: Vec<String>,
}

impl AdvancedSearch {
    pub fn new(title: Option<&str>, pattern: Option<&str>) -> Self {
        fn non_blank(value: Option<&str>) -> Option<String> {
            value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        }
        Self {
            title: non_blank(title),
            pattern: non_blank(pattern),
            ..Self::default()
        }
    }

    /// Set a filter from its raw comma-separated parameter.
    pub fn with_filter(mut self, category: FilterCategory, raw: Option<&str>) -> Self {
        if let Some(raw) = raw {
            *self.values_mut(category) = split_values(raw);
        }
        self
    }

    pub fn values(&self, category: FilterCategory) -> &[String] {
        match category {
            FilterCategory::Corpus => &self.corpus,
            FilterCategory::TuneType => &self.tune_type,
            FilterCategory::Key => &self.key,
            FilterCategory::TimeSignature => &self.time_signature,
        }
    }

    fn values_mut(&mut self, category: FilterCategory) -> &mut Vec<String> {
        match category {
            FilterCategory::Corpus => &mut self.corpus,
            FilterCategory::TuneType => &mut self.tune_type,
            FilterCategory::Key => &mut self.key,
            FilterCategory::TimeSignature => &mut self.time_signature,
        }
    }

    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }
}

// ============================================================================
// Blocks
// ============================================================================

fn values_row(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("({})", quoted(v)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `VALUES (?title ?match_strength ?id) { ("Spring" "72" "1") ... }`
fn title_values(matches: &[MatchResult]) -> String {
    let rows: Vec<String> = matches
        .iter()
        .map(|m| {
            format!(
                "({} {} {})",
                quoted(&m.title),
                quoted(&m.score.to_string()),
                quoted(&m.id)
            )
        })
        .collect();
    format!("VALUES (?title ?match_strength ?id) {{ {} }}", rows.join(" "))
}

fn attribute_triples(category: FilterCategory) -> String {
    match category {
        FilterCategory::Corpus => format!(
            "?tune core:isMemberOf ?corpusURI .\n    ?corpusURI core:isDefinedBy {} .\n    ?corpusURI core:name ?corpus .",
            ELECTRONIC_COLLECTION
        ),
        FilterCategory::TuneType => {
            "?tune mm:hasFormType ?tuneTypeURI .\n    ?tuneTypeURI core:name ?tuneType .".to_string()
        }
        FilterCategory::Key => "?tune mm:hasKey ?keyURI .\n    ?keyURI mm:tuneKeyName ?key .".to_string(),
        FilterCategory::TimeSignature => {
            "?tune jams:timeSignature ?signatureURI .\n    ?signatureURI mm:timesig ?signature .".to_string()
        }
    }
}

/// Restrict to any of `values`, or fetch the attribute optionally when unset.
/// Corpus is not part of the result rows, so an unset corpus adds nothing.
fn filter_block(category: FilterCategory, values: &[String]) -> String {
    if values.is_empty() {
        return match category {
            FilterCategory::Corpus => String::new(),
            _ => format!("    OPTIONAL {{ {} }}\n", attribute_triples(category)),
        };
    }
    format!(
        "    {}\n    VALUES (?{}) {{ {} }}\n",
        attribute_triples(category),
        category.variable(),
        values_row(values)
    )
}

/// Type, key and time signature of `?tune`, each optional.
const DESCRIPTIVE_OPTIONALS: &str = "    OPTIONAL { ?tune mm:hasFormType ?tuneTypeURI .\n    ?tuneTypeURI core:name ?tuneType . }
    OPTIONAL { ?tune mm:hasKey ?keyURI .\n    ?keyURI mm:tuneKeyName ?key . }
    OPTIONAL { ?tune jams:timeSignature ?signatureURI .\n    ?signatureURI mm:timesig ?signature . }
";

// ============================================================================
// Search Intents
// ============================================================================

/// Bulk listing of every tune id and title, used to build the title index.
pub fn all_tune_titles() -> String {
    let mut query = prologue(&[CORE, RDF, MM]);
    query.push_str(
        "SELECT DISTINCT ?title ?id
{
    ?tune rdf:type mm:MusicEntity .
    ?tune core:title ?title .
    ?tune core:id ?id .
}",
    );
    query
}

/// Tunes whose titles were matched by the fuzzy search, strongest first.
pub fn tune_by_title(matches: &[MatchResult]) -> String {
    let mut query = prologue(&[JAMS, MM, CORE, RDF, XSD]);
    query.push_str(
        "SELECT ?title ?tuneType ?key ?signature ?id
{
    ?tune rdf:type mm:MusicEntity .
    ?tune core:title ?title .
    ?tune core:id ?id .
",
    );
    query.push_str(DESCRIPTIVE_OPTIONALS);
    query.push_str(&format!("    {}\n", title_values(matches)));
    query.push_str("} ORDER BY DESC(xsd:integer(?match_strength)) ?title ?id");
    query
}

/// Tunes containing the given pattern.
pub fn pattern_search(pattern: &str) -> String {
    let mut query = prologue(&[JAMS, MM, CORE, XYZ, RDF]);
    query.push_str(&format!(
        "SELECT DISTINCT ?title ?tuneType ?key ?signature ?id
WHERE
{{
    ?obs jams:ofPattern ?patternURI .
    ?patternURI xyz:pattern_content {} .
    ?annotation jams:includesObservation ?obs .
    ?annotation jams:isJAMSAnnotationOf ?tune .
    ?tune rdf:type mm:MusicEntity .
    ?tune core:id ?id .
    OPTIONAL {{ ?tune core:title ?title }}
",
        quoted(pattern)
    ));
    query.push_str(DESCRIPTIVE_OPTIONALS);
    query.push_str("} ORDER BY ?title ?id");
    query
}

/// Multi-filter search. `matches` is only consulted when a title is given.
pub fn advanced_search(search: &AdvancedSearch, matches: &[MatchResult]) -> String {
    let mut query = prologue(&[JAMS, MM, CORE, XYZ, RDF, XSD]);
    query.push_str(
        "SELECT DISTINCT ?title ?tuneType ?key ?signature ?id
WHERE
{
    ?tune rdf:type mm:MusicEntity .
",
    );

    if let Some(pattern) = &search.pattern {
        query.push_str(&format!(
            "    ?patternURI xyz:pattern_content {} .
    ?obs jams:ofPattern ?patternURI .
    ?annotation jams:includesObservation ?obs .
    ?annotation jams:isJAMSAnnotationOf ?tune .
",
            quoted(pattern)
        ));
    }

    for category in FilterCategory::ALL {
        query.push_str(&filter_block(category, search.values(category)));
    }

    if search.has_title() {
        query.push_str("    ?tune core:title ?title .\n");
        query.push_str(&format!("    {}\n", title_values(matches)));
    } else {
        query.push_str("    OPTIONAL { ?tune core:title ?title }\n");
    }

    query.push_str("    ?tune core:id ?id .\n}");
    if search.has_title() {
        query.push_str(" ORDER BY DESC(xsd:integer(?match_strength)) ?title ?id");
    } else {
        query.push_str(" ORDER BY ?title ?id");
    }
    query
}

// ============================================================================
// Pattern Network
// ============================================================================

fn complexity_filter() -> String {
    format!("    FILTER (?comp > \"{}\"^^xsd:float) .\n", TRIVIAL_COMPLEXITY)
}

/// Most frequent patterns in one tune.
pub fn most_common_patterns(id: &str, exclude_trivial: bool) -> String {
    let mut query = prologue(&[JAMS, CORE, XYZ, RDF, MM, XSD]);
    query.push_str(&format!(
        "SELECT ?pattern (COUNT(?pattern) AS ?patternFreq)
WHERE {{
    ?tune rdf:type mm:MusicEntity .
    ?tune core:id {} .
    ?annotation jams:isJAMSAnnotationOf ?tune .
    ?annotation jams:includesObservation ?observation .
    ?observation jams:ofPattern ?patternURI .
",
        quoted(id)
    ));
    if exclude_trivial {
        query.push_str("    ?patternURI xyz:pattern_complexity ?comp .\n");
        query.push_str(&complexity_filter());
    }
    query.push_str(&format!(
        "    ?patternURI xyz:pattern_content ?pattern .
}} GROUP BY ?pattern
ORDER BY DESC(?patternFreq) ?pattern LIMIT {}",
        COMMON_PATTERN_LIMIT
    ));
    query
}

/// Patterns occurring in both `id` and `prev`.
pub fn common_patterns(id: &str, prev: &str) -> String {
    let mut query = prologue(&[JAMS, CORE, XYZ, RDF, MM]);
    query.push_str(&format!(
        "SELECT ?pattern
{{
    ?tune1 rdf:type mm:MusicEntity .
    ?tune1 core:id {} .
    ?annotation1 jams:isJAMSAnnotationOf ?tune1 .
    ?annotation1 jams:includesObservation ?observation1 .
    ?observation1 jams:ofPattern ?patternURI .
    ?tune2 rdf:type mm:MusicEntity .
    ?tune2 core:id {} .
    ?annotation2 jams:isJAMSAnnotationOf ?tune2 .
    ?annotation2 jams:includesObservation ?observation2 .
    ?observation2 jams:ofPattern ?patternURI .
    ?patternURI xyz:pattern_content ?pattern .
}} GROUP BY ?pattern
ORDER BY DESC(COUNT(?pattern)) ?pattern LIMIT {}",
        quoted(id),
        quoted(prev),
        COMMON_PATTERN_LIMIT
    ));
    query
}

/// Pattern nodes around a tune, weighted by complexity times frequency.
pub fn neighbour_patterns(id: &str, page: Page, exclude_trivial: bool) -> String {
    let mut query = prologue(&[JAMS, MM, CORE, XYZ, RDF, XSD]);
    query.push_str(&format!(
        "SELECT ?pattern
{{
    ?tune rdf:type mm:MusicEntity .
    ?tune core:id {} .
    ?annotation jams:isJAMSAnnotationOf ?tune .
    ?annotation jams:includesObservation ?observation .
    ?observation jams:ofPattern ?patternURI .
    ?patternURI xyz:pattern_complexity ?comp .
",
        quoted(id)
    ));
    if exclude_trivial {
        query.push_str(&complexity_filter());
    }
    query.push_str(&format!(
        "    ?patternURI xyz:pattern_content ?pattern .
}} GROUP BY ?pattern ORDER BY DESC(?comp*COUNT(?pattern)) DESC(?comp) DESC(COUNT(?pattern))
{}",
        page.clause()
    ));
    query
}

/// Tune nodes containing a pattern, most occurrences first.
pub fn neighbour_tunes_by_pattern(pattern: &str, page: Page) -> String {
    let mut query = prologue(&[JAMS, MM, CORE, XYZ, RDF, TUNES]);
    query.push_str(&format!(
        "SELECT ?title ?id ?family
WHERE
{{
    ?patternURI xyz:pattern_content ?pattern .
    VALUES ?pattern {{ {} }}
    ?obs jams:ofPattern ?patternURI .
    ?annotation jams:includesObservation ?obs .
    ?annotation jams:isJAMSAnnotationOf ?tune .
    ?tune rdf:type mm:MusicEntity .
    ?tune core:id ?id .
    ?tune core:isMemberOf ?tuneFamilyURI .
    ?tuneFamilyURI rdf:type tunes:TuneFamily .
    ?tuneFamilyURI mm:tuneFamilyName ?family .
    OPTIONAL {{ ?tune core:title ?title }}
}} GROUP BY ?id ?title ?family ORDER BY DESC(COUNT(?pattern)) ?title ?id
{}",
        quoted(pattern),
        page.clause()
    ));
    query
}

/// Tune nodes sharing patterns with a tune, weighted by pattern complexity.
pub fn neighbour_tunes_by_tune(id: &str, page: Page) -> String {
    let mut query = prologue(&[JAMS, MM, CORE, XYZ, TUNES, RDF]);
    query.push_str(&format!(
        "SELECT ?title ?id ?family
WHERE {{
    SELECT ?title ?id ?family ?pattern (COUNT(*) * ?complexity AS ?count_pattern_by_c)
    WHERE
    {{
        ?givenTune rdf:type mm:MusicEntity .
        ?givenTune core:id {} .
        ?givenTune core:id ?givenTuneId .
        ?givenAnnot jams:isJAMSAnnotationOf ?givenTune .
        ?givenAnnot jams:includesObservation ?givenObs .
        ?givenObs jams:ofPattern ?patternURI .
        ?otherObs jams:ofPattern ?patternURI .
        ?otherAnnot jams:includesObservation ?otherObs .
        ?otherAnnot jams:isJAMSAnnotationOf ?otherTune .
        ?otherTune rdf:type mm:MusicEntity .
        ?otherTune core:id ?id .
        FILTER(?id != ?givenTuneId) .
        ?otherTune core:title ?title .
        OPTIONAL {{ ?otherTune core:isMemberOf ?tuneFamilyURI .
        ?tuneFamilyURI rdf:type tunes:TuneFamily .
        ?tuneFamilyURI mm:tuneFamilyName ?family . }}
        ?patternURI xyz:pattern_content ?pattern .
        ?patternURI xyz:pattern_complexity ?complexity .
    }} GROUP BY ?title ?id ?family ?pattern ?complexity
}} GROUP BY ?title ?id ?family
ORDER BY DESC(SUM(?count_pattern_by_c))
{}",
        quoted(id),
        page.clause()
    ));
    query
}

// ============================================================================
// Tune Pages
// ============================================================================

/// Title, family and external link of one tune.
pub fn tune_data(id: &str) -> String {
    let mut query = prologue(&[MM, CORE, RDF, TUNES]);
    query.push_str(&format!(
        "SELECT ?title ?tuneFamily ?link
WHERE {{
    ?tune rdf:type mm:MusicEntity .
    ?tune core:id {} .
    ?tune core:title ?title .
    OPTIONAL {{ ?tune core:isMemberOf ?tuneFamilyURI .
    ?tuneFamilyURI rdf:type tunes:TuneFamily .
    ?tuneFamilyURI mm:tuneFamilyName ?tuneFamily . }}
    OPTIONAL {{ ?tune core:description ?link . }}
}}",
        quoted(id)
    ));
    query
}

pub fn tune_family_members(family: &str) -> String {
    let mut query = prologue(&[MM, CORE, RDF, TUNES]);
    query.push_str(&format!(
        "SELECT ?title ?id ?type
WHERE
{{
    ?tune rdf:type mm:MusicEntity .
    ?tune core:isMemberOf ?tuneFamilyURI .
    ?tuneFamilyURI rdf:type tunes:TuneFamily .
    ?tuneFamilyURI mm:tuneFamilyName {} .
    OPTIONAL {{ ?tune core:title ?title }}
    ?tune core:id ?id .
    OPTIONAL {{ ?tune mm:hasFormType ?typeURI .
    ?typeURI core:name ?type . }}
}} ORDER BY ASC(?title)",
        quoted(family)
    ));
    query
}

// ============================================================================
// Metadata Listings
// ============================================================================

pub fn corpus_list() -> String {
    let mut query = prologue(&[CORE, RDF, MM]);
    query.push_str(&format!(
        "SELECT DISTINCT ?corpus
WHERE
{{
    ?tune rdf:type mm:MusicEntity .
    ?tune core:isMemberOf ?corpusURI .
    ?corpusURI core:isDefinedBy {} .
    ?corpusURI core:name ?corpus .
}} ORDER BY ?corpus",
        ELECTRONIC_COLLECTION
    ));
    query
}

pub fn keys_list() -> String {
    let mut query = prologue(&[MM]);
    query.push_str(
        "SELECT DISTINCT ?key
WHERE
{
    ?keyURI mm:tuneKeyName ?key .
} ORDER BY ?key",
    );
    query
}

pub fn time_signature_list() -> String {
    let mut query = prologue(&[MM]);
    query.push_str(
        "SELECT DISTINCT ?signature
WHERE
{
    ?timesigURI mm:timesig ?signature .
} ORDER BY ?signature",
    );
    query
}

pub fn tune_type_list() -> String {
    let mut query = prologue(&[MM, CORE, RDF]);
    query.push_str(
        "SELECT DISTINCT ?tuneType
WHERE
{
    ?tune rdf:type mm:MusicEntity .
    ?tune mm:hasFormType ?tuneTypeURI .
    ?tuneTypeURI core:name ?tuneType .
} ORDER BY ?tuneType",
    );
    query
}

/// Listing query for one filter category.
pub fn category_list(category: FilterCategory) -> String {
    match category {
        FilterCategory::Corpus => corpus_list(),
        FilterCategory::TuneType => tune_type_list(),
        FilterCategory::Key => keys_list(),
        FilterCategory::TimeSignature => time_signature_list(),
    }
}

/// Release version of the knowledge graph.
pub fn kg_version() -> String {
    let mut query = prologue(&[JAMS]);
    query.push_str(
        "SELECT DISTINCT ?version
WHERE
{
    ?s jams:release ?version
}",
    );
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::is_literal_safe;

    fn matched(title: &str, score: u8, id: &str) -> MatchResult {
        MatchResult {
            title: title.to_string(),
            score,
            id: id.to_string(),
        }
    }

    /// Text of every double-quoted literal in `query`, still escaped.
    fn literals(query: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut chars = query.chars();
        while let Some(c) = chars.next() {
            if c != '"' {
                continue;
            }
            let mut lit = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        lit.push(c);
                        if let Some(next) = chars.next() {
                            lit.push(next);
                        }
                    }
                    '"' => break,
                    _ => lit.push(c),
                }
            }
            out.push(lit);
        }
        out
    }

    #[test]
    fn test_page_offsets() {
        assert_eq!(Page::from_click("0").unwrap().offset(), 0);
        assert_eq!(Page::from_click("3").unwrap().offset(), 15);
        assert_eq!(Page::new(2).clause(), "OFFSET 10 LIMIT 5");
    }

    #[test]
    fn test_page_rejects_bad_click_numbers() {
        for raw in ["-1", "1.5", "abc", ""] {
            let err = Page::from_click(raw).unwrap_err();
            assert!(matches!(err, QueryError::InvalidParameter { ref param, .. } if param == "clickNum"));
        }
    }

    #[test]
    fn test_parse_exclude_trivial() {
        assert_eq!(parse_exclude_trivial(None), Ok(false));
        assert_eq!(parse_exclude_trivial(Some("false")), Ok(false));
        assert_eq!(parse_exclude_trivial(Some("true")), Ok(true));
        assert!(parse_exclude_trivial(Some("yes")).is_err());
    }

    #[test]
    fn test_split_values() {
        assert_eq!(split_values("Jig, Reel,,Jig "), vec!["Jig", "Reel"]);
        assert!(split_values(" , ").is_empty());
    }

    #[test]
    fn test_tune_type_unset_is_optional() {
        let search = AdvancedSearch::new(None, None);
        let query = advanced_search(&search, &[]);
        assert!(query.contains(
            "OPTIONAL { ?tune mm:hasFormType ?tuneTypeURI .\n    ?tuneTypeURI core:name ?tuneType . }"
        ));
        assert!(!query.contains("VALUES (?tuneType)"));
        assert!(query.ends_with("ORDER BY ?title ?id"));
    }

    #[test]
    fn test_tune_type_filter_restricts_values() {
        let search = AdvancedSearch::new(None, None).with_filter(FilterCategory::TuneType, Some("Jig,Reel"));
        let query = advanced_search(&search, &[]);
        assert!(query.contains("VALUES (?tuneType) { (\"Jig\") (\"Reel\") }"));
        assert!(query.contains("?tune mm:hasFormType ?tuneTypeURI .\n    ?tuneTypeURI core:name ?tuneType .\n    VALUES"));
        assert!(!query.contains("OPTIONAL { ?tune mm:hasFormType"));
        // other categories stay optional
        assert!(query.contains("OPTIONAL { ?tune mm:hasKey ?keyURI"));
    }

    #[test]
    fn test_corpus_only_constrains_when_set() {
        let unset = advanced_search(&AdvancedSearch::new(None, None), &[]);
        assert!(!unset.contains("?corpus"));

        let search = AdvancedSearch::new(None, None).with_filter(FilterCategory::Corpus, Some("thesession"));
        let query = advanced_search(&search, &[]);
        assert!(query.contains("VALUES (?corpus) { (\"thesession\") }"));
        assert!(query.contains(ELECTRONIC_COLLECTION));
    }

    #[test]
    fn test_advanced_with_title_uses_match_block() {
        let search = AdvancedSearch::new(Some("sprig"), Some("abc"));
        let query = advanced_search(&search, &[matched("Spring", 72, "1")]);
        assert!(query.contains("VALUES (?title ?match_strength ?id) { (\"Spring\" \"72\" \"1\") }"));
        assert!(query.contains("?patternURI xyz:pattern_content \"abc\" ."));
        assert!(query.ends_with("ORDER BY DESC(xsd:integer(?match_strength)) ?title ?id"));
    }

    #[test]
    fn test_blank_title_and_pattern_are_unset() {
        let search = AdvancedSearch::new(Some("  "), Some(""));
        assert_eq!(search, AdvancedSearch::default());
        let query = advanced_search(&search, &[]);
        assert!(query.contains("OPTIONAL { ?tune core:title ?title }"));
        assert!(!query.contains("pattern_content"));
    }

    #[test]
    fn test_tune_by_title_orders_by_strength() {
        let query = tune_by_title(&[matched("Spring", 72, "1"), matched("Summer", 40, "2")]);
        assert!(query.contains("(\"Spring\" \"72\" \"1\") (\"Summer\" \"40\" \"2\")"));
        assert!(query.contains(XSD));
        assert!(query.ends_with("ORDER BY DESC(xsd:integer(?match_strength)) ?title ?id"));
    }

    #[test]
    fn test_hostile_values_stay_inside_literals() {
        let hostile = "x\" } ;\n DROP ALL ;\r\n { \"'\t \\";
        let queries = vec![
            pattern_search(hostile),
            most_common_patterns(hostile, true),
            common_patterns(hostile, hostile),
            neighbour_patterns(hostile, Page::new(1), false),
            neighbour_tunes_by_pattern(hostile, Page::new(0)),
            neighbour_tunes_by_tune(hostile, Page::new(0)),
            tune_data(hostile),
            tune_family_members(hostile),
            tune_by_title(&[matched(hostile, 50, hostile)]),
            advanced_search(
                &AdvancedSearch::new(Some(hostile), Some(hostile))
                    .with_filter(FilterCategory::Key, Some(hostile)),
                &[matched(hostile, 50, hostile)],
            ),
        ];
        for query in queries {
            for lit in literals(&query) {
                assert!(is_literal_safe(&lit), "literal {:?} in:\n{}", lit, query);
            }
        }
    }

    #[test]
    fn test_line_breaks_are_escaped_inside_literals() {
        let query = pattern_search("abc\ndef");
        assert!(query.contains(r#"xyz:pattern_content "abc\ndef" ."#));

        let query = tune_by_title(&[matched("First line\r\nsecond", 80, "9")]);
        assert!(query.contains(r#"("First line\r\nsecond" "80" "9")"#));
    }

    #[test]
    fn test_trivial_pattern_filter() {
        let with = most_common_patterns("42", true);
        assert!(with.contains("FILTER (?comp > \"0.4\"^^xsd:float)"));
        assert!(with.ends_with("LIMIT 18"));
        let without = most_common_patterns("42", false);
        assert!(!without.contains("FILTER"));

        assert!(neighbour_patterns("42", Page::new(0), true).contains("FILTER (?comp"));
        assert!(!neighbour_patterns("42", Page::new(0), false).contains("FILTER (?comp"));
    }

    #[test]
    fn test_paged_queries_end_with_page_clause() {
        let page = Page::new(4);
        assert!(neighbour_patterns("1", page, false).ends_with("OFFSET 20 LIMIT 5"));
        assert!(neighbour_tunes_by_pattern("abc", page).ends_with("OFFSET 20 LIMIT 5"));
        assert!(neighbour_tunes_by_tune("1", page).ends_with("OFFSET 20 LIMIT 5"));
    }

    #[test]
    fn test_listing_queries_select_their_column() {
        for category in FilterCategory::ALL {
            let query = category_list(category);
            assert!(query.contains(&format!("SELECT DISTINCT ?{}", category.variable())));
        }
        assert!(all_tune_titles().contains("SELECT DISTINCT ?title ?id"));
        assert!(kg_version().contains("?version"));
    }
}
