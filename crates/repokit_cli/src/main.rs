//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `repokit_core` linkage with a version probe.
//! - Walk through save, derived finders, paging and a bulk update on an
//!   in-memory database, printing deterministic output.
//!
//! Set `REPOKIT_LOG_DIR` to an absolute path to also write file logs, and
//! `REPOKIT_LOG_LEVEL` to override the build's default level.
//! `REPOKIT_TRACE_SQL=1` adds statement text at `trace`.

use log::info;
use repokit_core::db::schema::ensure_sample_schema;
use repokit_core::{
    default_log_level, init_logging, log_runtime_settings, open_db_in_memory_with, Direction,
    LogLevel, LogSettings, Member, MemberRepository, PageRequest, RepositoryConfig, StoreOptions,
    Team, TeamRepository, UnitOfWork,
};
use std::error::Error;

fn log_settings_from_env() -> Result<Option<LogSettings>, Box<dyn Error>> {
    let Ok(dir) = std::env::var("REPOKIT_LOG_DIR") else {
        return Ok(None);
    };
    let level = match std::env::var("REPOKIT_LOG_LEVEL") {
        Ok(value) => value.parse::<LogLevel>()?,
        Err(_) => default_log_level(),
    };
    let mut settings = LogSettings::new(level, dir);
    if std::env::var("REPOKIT_TRACE_SQL").is_ok_and(|value| value == "1") {
        settings = settings.with_statement_trace();
    }
    Ok(Some(settings))
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("repokit_core ping={}", repokit_core::ping());
    println!("repokit_core version={}", repokit_core::core_version());

    if let Some(settings) = log_settings_from_env()? {
        init_logging(&settings)?;
    }

    let options = StoreOptions::default();
    let config = RepositoryConfig::default();
    log_runtime_settings(&config, &options);

    let mut conn = open_db_in_memory_with(&options)?;
    ensure_sample_schema(&conn)?;

    let teams = TeamRepository::new(config.clone());
    let members = MemberRepository::new(config)?;

    let mut uow = UnitOfWork::begin(&mut conn)?;
    let team = teams.save(&mut uow, Team::new("teamA"))?;
    for (index, age) in [10, 19, 20, 21, 40].into_iter().enumerate() {
        let member = Member::with_team(format!("member{}", index + 1), age, &team.borrow());
        members.save(&mut uow, member)?;
    }

    let request = PageRequest::of_direction(0, 3, Direction::Desc, &["username"])?;
    let page = members.find_page(&mut uow, &[], &request)?;
    let names: Vec<String> = page
        .content
        .iter()
        .map(|member| member.borrow().username.clone())
        .collect();
    println!(
        "page number={} total_elements={} total_pages={} has_next={} content={}",
        page.number,
        page.total_elements,
        page.total_pages,
        page.has_next,
        names.join(",")
    );

    let older = members.find_by_username_and_age_greater_than(&mut uow, "member5", 30)?;
    println!("derived findByUsernameAndAgeGreaterThan matches={}", older.len());

    let updated = members.bulk_age_plus(&mut uow, 20)?;
    println!("bulk_age_plus rows={updated}");

    uow.commit()?;
    info!("event=cli_walkthrough module=cli status=ok");
    Ok(())
}
