//! Member repository: generated finders plus hand-written queries.
//!
//! # Responsibility
//! - Declare the member finders once, so descriptor mistakes fail at startup.
//! - Provide the join, projection and named-parameter queries members need.
//! - Expose the custom fragment through `MemberRepositoryCustom`.
//!
//! # Invariants
//! - Every method runs on the caller's unit of work; fragment queries share
//!   its transaction and identity map.

use crate::config::RepositoryConfig;
use crate::db::{BoundQuery, LockMode, QueryParams};
use crate::model::entity::{read_optional_id, Entity};
use crate::model::member::{Member, MemberId};
use crate::model::team::Team;
use crate::page::{Page, PageRequest, Slice};
use crate::query::{Assignment, Operand, Predicate, Sort};
use crate::repo::managed::Managed;
use crate::repo::repository::{Counter, Finder, Projection, Repository};
use crate::repo::shape::{Many, Optional, Single};
use crate::repo::unit_of_work::UnitOfWork;
use crate::repo::RepoResult;
use log::info;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;
use std::ops::Deref;

const MEMBER_COLUMNS: &str = "member_id, username, age, team_id";

/// Member id, username and team name, read through a member/team join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDto {
    pub id: MemberId,
    pub username: String,
    pub team_name: Option<String>,
}

impl MemberDto {
    /// `None` for a member that has not been saved yet.
    pub fn from_member(member: &Member, team_name: Option<String>) -> Option<Self> {
        member.id.map(|id| Self {
            id,
            username: member.username.clone(),
            team_name,
        })
    }
}

/// Username-only projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsernameOnly {
    pub username: String,
}

impl Projection for UsernameOnly {
    fn fields() -> &'static [&'static str] {
        &["username"]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            username: row.get("username")?,
        })
    }
}

/// Hand-written member queries composed into [`MemberRepository`].
pub trait MemberRepositoryCustom {
    fn find_member_custom(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<Member>>>;
}

/// Default fragment implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberRepositoryImpl;

impl MemberRepositoryCustom for MemberRepositoryImpl {
    fn find_member_custom(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<Member>>> {
        let query = BoundQuery::new(
            format!("SELECT {MEMBER_COLUMNS} FROM member ORDER BY member_id"),
            QueryParams::none(),
        );
        let rows = uow.store().execute(&query, Member::from_row)?;
        Ok(uow.attach_all(rows))
    }
}

/// Member repository with fragment `C`; derefs to the generic repository.
pub struct MemberRepository<C = MemberRepositoryImpl> {
    base: Repository<Member, C>,
    by_username_and_age_greater_than: Finder<Member, Many>,
    list_by_username: Finder<Member, Many>,
    member_by_username: Finder<Member, Single>,
    optional_by_username: Finder<Member, Optional>,
    by_username_in: Finder<Member, Many>,
    by_age: Finder<Member, Many>,
    by_team_id: Finder<Member, Many>,
    top3_hello: Finder<Member, Many>,
    read_only_by_username: Finder<Member, Many>,
    lock_by_username: Finder<Member, Many>,
    count_by_age: Counter<Member>,
}

impl MemberRepository<MemberRepositoryImpl> {
    pub fn new(config: RepositoryConfig) -> RepoResult<Self> {
        Self::with_fragment(config, MemberRepositoryImpl)
    }
}

impl<C> MemberRepository<C> {
    /// Builds the repository with a caller-supplied fragment.
    ///
    /// # Errors
    /// Fails when any finder descriptor does not resolve against `Member`.
    pub fn with_fragment(config: RepositoryConfig, fragment: C) -> RepoResult<Self> {
        let base = Repository::<Member>::new(config).with_fragment(fragment);
        let repo = Self {
            by_username_and_age_greater_than: base.finder("findByUsernameAndAgeGreaterThan")?,
            list_by_username: base.finder("findListByUsername")?,
            member_by_username: base.finder("findMemberByUsername")?,
            optional_by_username: base.finder("findOptionalByUsername")?,
            by_username_in: base.finder("findByUsernameInOrderByIdAsc")?,
            by_age: base.finder("findByAge")?,
            by_team_id: base.finder("findByTeamIdOrderByIdAsc")?,
            top3_hello: base.finder("findTop3HelloByOrderByIdAsc")?,
            read_only_by_username: base.finder("findReadOnlyByUsername")?.read_only(),
            lock_by_username: base
                .finder("findLockByUsername")?
                .lock(LockMode::PessimisticWrite),
            count_by_age: base.counter("countByAge")?,
            base,
        };
        info!("event=repo_init module=repo status=ok entity=Member finders=11");
        Ok(repo)
    }

    pub fn find_by_username_and_age_greater_than(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
        age: i64,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.base.find_by(
            uow,
            &self.by_username_and_age_greater_than,
            vec![username.into(), age.into()],
        )
    }

    pub fn find_list_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.base
            .find_by(uow, &self.list_by_username, vec![username.into()])
    }

    /// `None` when no member matches; `NonUniqueResult` when several do.
    pub fn find_member_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Option<Managed<Member>>> {
        self.base
            .find_by(uow, &self.member_by_username, vec![username.into()])
    }

    pub fn find_optional_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Option<Managed<Member>>> {
        self.base
            .find_by(uow, &self.optional_by_username, vec![username.into()])
    }

    /// Members whose username is in `names`; an empty list matches nothing.
    pub fn find_by_names(
        &self,
        uow: &mut UnitOfWork<'_>,
        names: &[&str],
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.base.find_by(
            uow,
            &self.by_username_in,
            vec![Operand::text_list(names.iter().copied())],
        )
    }

    pub fn find_by_age(
        &self,
        uow: &mut UnitOfWork<'_>,
        age: i64,
        request: &PageRequest,
    ) -> RepoResult<Page<Managed<Member>>> {
        self.base
            .find_page_by(uow, &self.by_age, vec![age.into()], request)
    }

    pub fn find_slice_by_age(
        &self,
        uow: &mut UnitOfWork<'_>,
        age: i64,
        request: &PageRequest,
    ) -> RepoResult<Slice<Managed<Member>>> {
        self.base
            .find_slice_by(uow, &self.by_age, vec![age.into()], request)
    }

    pub fn count_by_age(&self, uow: &mut UnitOfWork<'_>, age: i64) -> RepoResult<u64> {
        self.base.count_by(uow, &self.count_by_age, vec![age.into()])
    }

    /// One-to-many navigation from a team to its members.
    pub fn find_by_team(
        &self,
        uow: &mut UnitOfWork<'_>,
        team: &Team,
    ) -> RepoResult<Vec<Managed<Member>>> {
        let Some(team_id) = team.id else {
            return Ok(Vec::new());
        };
        self.base
            .find_by(uow, &self.by_team_id, vec![team_id.into()])
    }

    pub fn find_top3_hello(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<Member>>> {
        self.base.find_by(uow, &self.top3_hello, Vec::new())
    }

    /// Detached results; edits to them are never picked up by the unit of work.
    pub fn find_read_only_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.base
            .find_by(uow, &self.read_only_by_username, vec![username.into()])
    }

    /// Requests a pessimistic write lock; SQLite already serializes writers.
    pub fn find_lock_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.base
            .find_by(uow, &self.lock_by_username, vec![username.into()])
    }

    /// Adds one year to every member aged `age` or older.
    pub fn bulk_age_plus(&self, uow: &mut UnitOfWork<'_>, age: i64) -> RepoResult<usize> {
        self.base.bulk_update(
            uow,
            &[Predicate::ge("age", age)],
            &[Assignment::increment("age", 1)],
        )
    }

    /// Named-parameter query on username and exact age.
    pub fn find_user(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
        age: i64,
    ) -> RepoResult<Vec<Managed<Member>>> {
        let query = BoundQuery::new(
            format!(
                "SELECT {MEMBER_COLUMNS} FROM member WHERE username = :username AND age = :age"
            ),
            QueryParams::named([
                ("username", Value::Text(username.to_string())),
                ("age", Value::Integer(age)),
            ]),
        );
        self.base.find_native(uow, &query)
    }

    pub fn find_username_list(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<String>> {
        let query = BoundQuery::new(
            "SELECT username FROM member ORDER BY member_id",
            QueryParams::none(),
        );
        Ok(uow.store().execute(&query, |row| row.get(0))?)
    }

    /// Members joined with their team; members without a team are excluded.
    pub fn find_member_dto(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<MemberDto>> {
        let query = BoundQuery::new(
            "SELECT m.member_id, m.username, t.name AS team_name \
             FROM member m JOIN team t ON m.team_id = t.team_id \
             ORDER BY m.member_id",
            QueryParams::none(),
        );
        Ok(uow.store().execute(&query, |row| {
            Ok(MemberDto {
                id: row.get("member_id")?,
                username: row.get("username")?,
                team_name: row.get("team_name")?,
            })
        })?)
    }

    /// Loads members with their team in one query and manages both.
    pub fn find_with_team_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Vec<(Managed<Member>, Option<Managed<Team>>)>> {
        let query = BoundQuery::new(
            "SELECT m.member_id, m.username, m.age, m.team_id, t.name AS team_name \
             FROM member m LEFT JOIN team t ON m.team_id = t.team_id \
             WHERE m.username = ? ORDER BY m.member_id",
            vec![Value::Text(username.to_string())],
        );
        let rows = uow.store().execute(&query, |row| {
            let member = Member::from_row(row)?;
            let team = match read_optional_id(row, "team_id")? {
                Some(id) => Some(Team {
                    id: Some(id),
                    name: row.get("team_name")?,
                }),
                None => None,
            };
            Ok((member, team))
        })?;

        Ok(rows
            .into_iter()
            .map(|(member, team)| (uow.attach(member), team.map(|team| uow.attach(team))))
            .collect())
    }

    pub fn find_usernames_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Vec<UsernameOnly>> {
        self.base
            .find_projected(uow, &[Predicate::eq("username", username)], &Sort::unsorted())
    }
}

impl<C> Deref for MemberRepository<C> {
    type Target = Repository<Member, C>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<C: MemberRepositoryCustom> MemberRepositoryCustom for MemberRepository<C> {
    fn find_member_custom(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<Member>>> {
        self.base.fragment().find_member_custom(uow)
    }
}
