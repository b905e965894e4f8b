//! Full-text search over events and the records they are linked to.
//!
//! A phrase is split into keywords. Each keyword must match at least one of
//! the searchable fields; all keywords must match.

use sea_query::{Alias, Expr, ExprTrait, LikeExpr, SimpleExpr};
use tracing::debug;

use super::sql::{
    CATEGORIES, EVENT_TYPES, EVENTS, EVENTS_CATEGORIES_MM, EVENTS_PLACES_MM, EVENTS_SPEAKERS_MM,
    EVENTS_TARGET_GROUPS_MM, LIKE_ESCAPE, PLACES, SPEAKERS, TARGET_GROUPS, TOPICS, all_of, any_of,
    col, escape_like_wildcards, linked, record_correlation, topic_correlation, topic_uid_in,
    visible_topics,
};

/// Keywords shorter than this (in bytes, after escaping) are ignored.
pub const MINIMUM_SEARCH_WORD_LENGTH: usize = 4;

/// Characters a string literal quoter prefixes with a backslash.
const QUOTED_CHARACTERS: [char; 7] = ['\\', '\'', '"', '\0', '\n', '\r', '\x1a'];

/// Split `phrase` on blanks and commas into escaped keywords long enough to search for.
///
/// Length is measured in bytes of the keyword as it would appear quoted in a
/// string literal, so a short word in a multi-byte script or with quotes may
/// still qualify.
pub fn keywords(phrase: &str) -> Vec<String> {
    phrase
        .split([' ', ','])
        .map(str::trim)
        .map(escape_like_wildcards)
        .filter(|word| quoted_len(word) >= MINIMUM_SEARCH_WORD_LENGTH)
        .collect()
}

/// Byte length of `word` once quote-escaped.
fn quoted_len(word: &str) -> usize {
    word.len() + word.chars().filter(|c| QUOTED_CHARACTERS.contains(c)).count()
}

/// Restriction matching events for every keyword of `phrase`.
///
/// `None` when no keyword is long enough.
pub fn compile(phrase: &str) -> Option<SimpleExpr> {
    let words = keywords(phrase);
    if words.is_empty() {
        debug!(phrase, "no searchable keywords");
        return None;
    }

    debug!(phrase, keywords = words.len(), "search compiled");
    Some(all_of(words.iter().map(|word| keyword_matches(word))))
}

/// OR over every searchable field for one escaped keyword.
fn keyword_matches(keyword: &str) -> SimpleExpr {
    let pattern = format!("%{keyword}%");

    any_of([
        contains(col(EVENTS, "accreditation_number"), &pattern),
        topic_text_matches(&pattern),
        speaker_matches(&pattern),
        place_matches(&pattern),
        event_type_matches(&pattern),
        related_title_matches(EVENTS_CATEGORIES_MM, CATEGORIES, &pattern),
        related_title_matches(EVENTS_TARGET_GROUPS_MM, TARGET_GROUPS, &pattern),
    ])
}

fn contains(column: Expr, pattern: &str) -> SimpleExpr {
    column.like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

/// Title, subtitle or description of the topic-level record.
fn topic_text_matches(pattern: &str) -> SimpleExpr {
    let mut topics = visible_topics();
    topics.and_where(any_of([
        contains(col(TOPICS, "title"), pattern),
        contains(col(TOPICS, "subtitle"), pattern),
        contains(col(TOPICS, "description"), pattern),
    ]));
    topic_uid_in(topics)
}

/// Title of the topic-level record's event type.
fn event_type_matches(pattern: &str) -> SimpleExpr {
    let mut topics = visible_topics();
    topics
        .from(Alias::new(EVENT_TYPES))
        .and_where(
            col(TOPICS, "event_type").equals((Alias::new(EVENT_TYPES), Alias::new("uid"))),
        )
        .and_where(contains(col(EVENT_TYPES, "title"), pattern));
    topic_uid_in(topics)
}

/// Any speaker of the record itself.
fn speaker_matches(pattern: &str) -> SimpleExpr {
    let mut query = linked(EVENTS_SPEAKERS_MM, SPEAKERS);
    query
        .and_where(record_correlation(EVENTS_SPEAKERS_MM))
        .and_where(contains(col(SPEAKERS, "title"), pattern));
    Expr::exists(query)
}

/// Title or city of any place of the record itself.
fn place_matches(pattern: &str) -> SimpleExpr {
    let mut query = linked(EVENTS_PLACES_MM, PLACES);
    query
        .and_where(record_correlation(EVENTS_PLACES_MM))
        .and_where(
            contains(col(PLACES, "title"), pattern).or(contains(col(PLACES, "city"), pattern)),
        );
    Expr::exists(query)
}

/// Title of any record linked to the topic-level record through `mm_table`.
fn related_title_matches(mm_table: &str, table: &str, pattern: &str) -> SimpleExpr {
    let mut query = linked(mm_table, table);
    query
        .and_where(topic_correlation(mm_table))
        .and_where(contains(col(table, "title"), pattern));
    Expr::exists(query)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sea_query::{PostgresQueryBuilder, Query};

    fn render(expr: SimpleExpr) -> String {
        let mut query = Query::select();
        query.expr(Expr::val(1)).and_where(expr);
        query.to_string(PostgresQueryBuilder)
    }

    #[test]
    fn short_words_are_dropped() {
        assert!(keywords("cat dog").is_empty());
        assert!(compile("cat dog").is_none());
        assert!(compile("").is_none());
        assert!(compile(" , ,, ").is_none());
    }

    #[test]
    fn splits_on_blanks_and_commas() {
        assert_eq!(keywords("yoga,pilates  dance"), vec!["yoga", "pilates", "dance"]);
    }

    #[test]
    fn escaping_counts_towards_length() {
        // "10%" is three characters but four bytes once escaped.
        assert_eq!(keywords("10%"), vec!["10!%"]);
    }

    #[test]
    fn quote_escaping_counts_towards_length() {
        assert_eq!(keywords("ab'"), vec!["ab'"]);
        assert_eq!(keywords("a\"b"), vec!["a\"b"]);
        assert!(keywords("ab").is_empty());
    }

    #[test]
    fn length_is_measured_in_bytes() {
        // Two characters, four bytes.
        assert_eq!(keywords("ßü"), vec!["ßü"]);
    }

    #[test]
    fn each_keyword_adds_one_group() {
        let sql = render(compile("yoga pilates").unwrap());

        assert!(sql.contains("'%yoga%'"), "{sql}");
        assert!(sql.contains("'%pilates%'"), "{sql}");
        assert!(sql.contains("ESCAPE '!'"), "{sql}");
        assert!(sql.contains(") AND ("), "{sql}");
    }

    #[test]
    fn searches_linked_records() {
        let sql = render(compile("yoga").unwrap());

        for table in [SPEAKERS, PLACES, EVENT_TYPES, CATEGORIES, TARGET_GROUPS] {
            assert!(sql.contains(table), "{table} missing from {sql}");
        }
        assert!(sql.contains("\"accreditation_number\""), "{sql}");
        assert!(sql.contains("\"city\""), "{sql}");
        assert!(sql.contains("\"topics\""), "{sql}");
    }

    #[test]
    fn topic_select_never_returns_dates() {
        let sql = render(topic_text_matches("%yoga%"));

        assert!(sql.contains("\"topics\".\"object_type\" <> 2"), "{sql}");
        assert!(sql.contains("\"topics\".\"hidden\" = 0"), "{sql}");
        assert!(sql.contains("\"tx_seminars_seminars\".\"topic\" IN"), "{sql}");
    }
}
