//! Derived queries parsed from method-name style descriptors.
//!
//! # Responsibility
//! - Parse descriptors such as `findByUsernameAndAgeGreaterThan` (or the
//!   snake_case spelling) into typed criteria.
//! - Bind call-time arguments into concrete predicates.
//!
//! # Invariants
//! - Parsing validates every field against the entity metadata, so a
//!   descriptor that parsed once can never fail with `InvalidField` later.
//! - Criteria are AND-joined; `Or` is rejected.
//!
//! # Grammar
//! ```text
//! descriptor := subject words* "By" [criterion ("And" criterion)*] ["OrderBy" order+]
//! subject    := find | read | get | query | count | exists
//! words      := TopN | FirstN | First | Distinct | <any other word, ignored>
//! criterion  := field [GreaterThan | GreaterThanEqual | LessThan | LessThanEqual | In | Like]
//! order      := field [Asc | Desc]
//! ```

use crate::model::entity::EntityMeta;
use crate::query::predicate::{Operand, Operator, Predicate};
use crate::query::sort::{Direction, Sort};
use crate::query::QueryError;
use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][a-z0-9]*|[a-z0-9]+").expect("valid descriptor word regex"));

/// What a derived query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Entity rows.
    Find,
    Count,
    Exists,
}

/// One parsed condition awaiting its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    pub field: &'static str,
    pub operator: Operator,
}

/// A parsed, validated derived query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedQuery {
    descriptor: String,
    subject: Subject,
    distinct: bool,
    limit: Option<u64>,
    criteria: Vec<Criterion>,
    sort: Sort,
}

impl DerivedQuery {
    /// Parses `descriptor` against `meta`.
    ///
    /// # Errors
    /// - `MalformedDescriptor` when the descriptor breaks the grammar.
    /// - `InvalidField` when a criterion or order key names an unknown field.
    pub fn parse(descriptor: &str, meta: &'static EntityMeta) -> Result<Self, QueryError> {
        let words: Vec<String> = WORD_RE
            .find_iter(descriptor)
            .map(|word| word.as_str().to_ascii_lowercase())
            .collect();
        let malformed = |reason: &str| QueryError::MalformedDescriptor {
            descriptor: descriptor.to_string(),
            reason: reason.to_string(),
        };

        let subject = match words.first().map(String::as_str) {
            Some("find" | "read" | "get" | "query") => Subject::Find,
            Some("count") => Subject::Count,
            Some("exists") => Subject::Exists,
            _ => return Err(malformed("expected find/read/get/query/count/exists prefix")),
        };

        let by_index = words
            .iter()
            .position(|word| word == "by")
            .ok_or_else(|| malformed("missing `By`"))?;

        let mut distinct = false;
        let mut limit = None;
        for word in &words[1..by_index] {
            if word == "distinct" {
                distinct = true;
            } else if let Some(count) = parse_limit_word(word) {
                if count == 0 {
                    return Err(malformed("result limit must be positive"));
                }
                limit = Some(count);
            }
        }

        let rest = &words[by_index + 1..];
        let (condition_words, order_words) = match rest
            .windows(2)
            .position(|pair| pair[0] == "order" && pair[1] == "by")
        {
            Some(index) => (&rest[..index], Some(&rest[index + 2..])),
            None => (rest, None),
        };

        if condition_words.iter().any(|word| word == "or") {
            return Err(malformed("`Or` connectors are not supported"));
        }

        let mut criteria = Vec::new();
        if !condition_words.is_empty() {
            for part in condition_words.split(|word| word == "and") {
                if part.is_empty() {
                    return Err(malformed("empty condition around `And`"));
                }
                criteria.push(parse_criterion(part, meta)?);
            }
        }

        let sort = match order_words {
            Some([]) => return Err(malformed("`OrderBy` without a field")),
            Some(words) => parse_order(words, meta)?,
            None => Sort::unsorted(),
        };

        Ok(Self {
            descriptor: descriptor.to_string(),
            subject,
            distinct,
            limit,
            criteria,
            sort,
        })
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Row cap from a `TopN`/`FirstN` word.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Static ordering from an `OrderBy` suffix.
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Binds one argument per criterion, in order.
    pub fn bind(&self, args: Vec<Operand>) -> Result<Vec<Predicate>, QueryError> {
        if args.len() != self.criteria.len() {
            return Err(QueryError::ArgumentCount {
                descriptor: self.descriptor.clone(),
                expected: self.criteria.len(),
                actual: args.len(),
            });
        }

        self.criteria
            .iter()
            .zip(args)
            .map(|(criterion, operand)| {
                let predicate = Predicate::new(criterion.field, criterion.operator, operand);
                if predicate.is_well_formed() {
                    Ok(predicate)
                } else {
                    Err(QueryError::OperandMismatch {
                        field: criterion.field.to_string(),
                        operator: criterion.operator,
                    })
                }
            })
            .collect()
    }
}

fn parse_limit_word(word: &str) -> Option<u64> {
    if word == "first" {
        return Some(1);
    }
    let digits = word
        .strip_prefix("top")
        .or_else(|| word.strip_prefix("first"))?;
    if digits.is_empty() {
        return Some(1);
    }
    digits.parse().ok()
}

fn parse_criterion(words: &[String], meta: &'static EntityMeta) -> Result<Criterion, QueryError> {
    let (field_words, operator) = match words {
        [head @ .., greater, than, equal]
            if greater == "greater" && than == "than" && equal == "equal" =>
        {
            (head, Operator::Ge)
        }
        [head @ .., less, than, equal] if less == "less" && than == "than" && equal == "equal" => {
            (head, Operator::Le)
        }
        [head @ .., greater, than] if greater == "greater" && than == "than" => {
            (head, Operator::Gt)
        }
        [head @ .., less, than] if less == "less" && than == "than" => (head, Operator::Lt),
        [head @ .., last] if last == "in" => (head, Operator::In),
        [head @ .., last] if last == "like" => (head, Operator::Like),
        all => (all, Operator::Eq),
    };

    Ok(Criterion {
        field: resolve_field(field_words, meta)?,
        operator,
    })
}

fn parse_order(words: &[String], meta: &'static EntityMeta) -> Result<Sort, QueryError> {
    let mut sort = Sort::unsorted();
    let mut pending: Vec<String> = Vec::new();
    for word in words {
        let direction = match word.as_str() {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        };
        match direction {
            Some(direction) => {
                let field = resolve_field(&pending, meta)?;
                sort = sort.then(field, direction);
                pending.clear();
            }
            None => pending.push(word.clone()),
        }
    }
    if !pending.is_empty() {
        let field = resolve_field(&pending, meta)?;
        sort = sort.then(field, Direction::Asc);
    }
    Ok(sort)
}

/// Matches lowercase words against field names, ignoring underscores.
fn resolve_field(words: &[String], meta: &'static EntityMeta) -> Result<&'static str, QueryError> {
    let key = words.concat();
    if key.is_empty() {
        return Err(QueryError::InvalidField {
            entity: meta.name,
            field: String::new(),
        });
    }
    meta.all_fields()
        .find(|field| field.name.replace('_', "").eq_ignore_ascii_case(&key))
        .map(|field| field.name)
        .ok_or(QueryError::InvalidField {
            entity: meta.name,
            field: key,
        })
}

#[cfg(test)]
mod tests {
    use super::{DerivedQuery, Subject};
    use crate::model::entity::Entity;
    use crate::model::member::Member;
    use crate::query::{Direction, Operand, Operator, QueryError};

    fn parse(descriptor: &str) -> Result<DerivedQuery, QueryError> {
        DerivedQuery::parse(descriptor, Member::meta())
    }

    #[test]
    fn parses_conjunction_with_comparison_suffix() {
        let query = parse("findByUsernameAndAgeGreaterThan").expect("valid descriptor");
        assert_eq!(query.subject(), Subject::Find);
        let criteria: Vec<_> = query
            .criteria()
            .iter()
            .map(|criterion| (criterion.field, criterion.operator))
            .collect();
        assert_eq!(
            criteria,
            vec![("username", Operator::Eq), ("age", Operator::Gt)]
        );
    }

    #[test]
    fn snake_case_descriptor_parses_the_same() {
        let camel = parse("findByUsernameAndAgeGreaterThan").expect("camel");
        let snake = parse("find_by_username_and_age_greater_than").expect("snake");
        assert_eq!(camel.criteria(), snake.criteria());
    }

    #[test]
    fn subject_words_and_limits_are_recognized() {
        let query = parse("findTop3HelloBy").expect("top3 descriptor");
        assert_eq!(query.limit(), Some(3));
        assert!(query.criteria().is_empty());

        let query = parse("findDistinctFirstByAge").expect("first descriptor");
        assert_eq!(query.limit(), Some(1));
        assert!(query.is_distinct());

        let query = parse("countByAge").expect("count descriptor");
        assert_eq!(query.subject(), Subject::Count);
        assert_eq!(parse("existsByUsername").expect("exists").subject(), Subject::Exists);
    }

    #[test]
    fn multi_word_fields_and_suffixes_resolve() {
        let query = parse(
            "findByTeamIdAndUsernameInAndUsernameLikeAndAgeLessThanAndAgeGreaterThanEqual",
        )
        .expect("valid descriptor");
        let criteria: Vec<_> = query
            .criteria()
            .iter()
            .map(|criterion| (criterion.field, criterion.operator))
            .collect();
        assert_eq!(
            criteria,
            vec![
                ("team_id", Operator::Eq),
                ("username", Operator::In),
                ("username", Operator::Like),
                ("age", Operator::Lt),
                ("age", Operator::Ge),
            ]
        );
    }

    #[test]
    fn order_by_suffix_builds_static_sort() {
        let query = parse("findByAgeOrderByUsernameDescId").expect("order by descriptor");
        let keys: Vec<_> = query
            .sort()
            .orders()
            .iter()
            .map(|order| (order.field.as_str(), order.direction))
            .collect();
        assert_eq!(
            keys,
            vec![("username", Direction::Desc), ("id", Direction::Asc)]
        );
        assert_eq!(query.criteria().len(), 1);
    }

    #[test]
    fn unknown_field_fails_with_invalid_field() {
        let err = parse("findByNicknameAndAge").expect_err("unknown field");
        assert_eq!(
            err,
            QueryError::InvalidField {
                entity: "Member",
                field: "nickname".to_string()
            }
        );
        assert!(matches!(
            parse("findByAgeOrderByHeight"),
            Err(QueryError::InvalidField { .. })
        ));
    }

    #[test]
    fn grammar_violations_are_malformed() {
        for descriptor in [
            "fetchByUsername",
            "findUsername",
            "findByUsernameOrAge",
            "findByUsernameAndAndAge",
            "findByOrderBy",
            "findTop0By",
        ] {
            assert!(
                matches!(parse(descriptor), Err(QueryError::MalformedDescriptor { .. })),
                "{descriptor} should be malformed"
            );
        }
    }

    #[test]
    fn bind_checks_arity_and_operand_shape() {
        let query = parse("findByUsernameIn").expect("in descriptor");
        let predicates = query
            .bind(vec![Operand::text_list(["AAA", "BBB"])])
            .expect("list operand binds");
        assert_eq!(predicates[0].field, "username");

        assert!(matches!(
            query.bind(vec!["AAA".into()]),
            Err(QueryError::OperandMismatch { .. })
        ));
        assert!(matches!(
            query.bind(Vec::new()),
            Err(QueryError::ArgumentCount {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }
}
