use repokit_core::db::schema::ensure_sample_schema;
use repokit_core::{
    open_db_in_memory, Direction, Managed, Member, MemberRepository, MissingDeletePolicy,
    PageRequest, Predicate, RepoError, RepositoryConfig, Team, TeamRepository, UnitOfWork,
};
use rusqlite::Connection;

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    ensure_sample_schema(&conn).unwrap();
    conn
}

fn members() -> MemberRepository {
    MemberRepository::new(RepositoryConfig::default()).unwrap()
}

fn usernames(rows: &[Managed<Member>]) -> Vec<String> {
    rows.iter().map(|row| row.borrow().username.clone()).collect()
}

#[test]
fn saved_member_is_found_by_id_as_the_same_instance() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let saved = repo.save(&mut uow, Member::new("memberA")).unwrap();
    let id = saved.borrow().id.unwrap();
    let found = repo.find_by_id(&mut uow, &id).unwrap().unwrap();

    assert!(found.is_same(&saved));
    assert_eq!(found.borrow().username, "memberA");
    assert_eq!(*found.borrow(), saved.snapshot());
}

#[test]
fn identity_holds_across_finders_and_survives_commit() {
    let mut conn = setup();
    let repo = members();

    let id = {
        let mut uow = UnitOfWork::begin(&mut conn).unwrap();
        let saved = repo.save(&mut uow, Member::with_age("member1", 10)).unwrap();
        let id = saved.borrow().id.unwrap();
        uow.commit().unwrap();
        id
    };

    let mut uow = UnitOfWork::begin(&mut conn).unwrap();
    let by_id = repo.find_by_id(&mut uow, &id).unwrap().unwrap();
    let by_name = repo.find_list_by_username(&mut uow, "member1").unwrap();
    assert_eq!(by_name.len(), 1);
    assert!(by_name[0].is_same(&by_id));
    assert_eq!(by_id.borrow().age, 10);
}

#[test]
fn basic_crud_counts_follow_saves_and_deletes() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let member1 = repo.save(&mut uow, Member::new("member1")).unwrap();
    let member2 = repo.save(&mut uow, Member::new("member2")).unwrap();
    repo.save(&mut uow, Member::new("member3")).unwrap();

    assert_eq!(repo.find_all(&mut uow).unwrap().len(), 3);
    assert_eq!(repo.count(&mut uow).unwrap(), 3);

    repo.delete(&mut uow, &member1).unwrap();
    let member2_id = member2.borrow().id.unwrap();
    repo.delete_by_id(&mut uow, &member2_id).unwrap();

    assert_eq!(repo.count(&mut uow).unwrap(), 1);
    assert!(repo.find_by_id(&mut uow, &member2_id).unwrap().is_none());
    assert!(!uow.contains(&member2));
}

#[test]
fn save_of_a_changed_handle_updates_the_row() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let member = repo.save(&mut uow, Member::with_age("member1", 10)).unwrap();
    member.borrow_mut().username = "renamed".to_string();
    let again = repo.save(&mut uow, member.clone()).unwrap();
    assert!(again.is_same(&member));

    uow.clear();
    let id = member.borrow().id.unwrap();
    let reloaded = repo.find_by_id(&mut uow, &id).unwrap().unwrap();
    assert!(!reloaded.is_same(&member));
    assert_eq!(reloaded.borrow().username, "renamed");
}

#[test]
fn save_with_unknown_id_inserts_under_that_id() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let mut member = Member::with_age("detached", 30);
    member.id = Some(42);
    repo.save(&mut uow, member).unwrap();

    uow.clear();
    let found = repo.find_by_id(&mut uow, &42).unwrap().unwrap();
    assert_eq!(found.borrow().username, "detached");
    assert!(repo.exists_by_id(&mut uow, &42).unwrap());
    assert!(!repo.exists_by_id(&mut uow, &43).unwrap());
}

#[test]
fn saving_a_detached_copy_refreshes_the_managed_instance() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let managed = repo.save(&mut uow, Member::with_age("member1", 10)).unwrap();
    let mut copy = managed.snapshot();
    copy.age = 11;

    let returned = repo.save(&mut uow, copy).unwrap();
    assert!(returned.is_same(&managed));
    assert_eq!(managed.borrow().age, 11);
}

#[test]
fn derived_query_applies_every_criterion() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    repo.save(&mut uow, Member::with_age("AAA", 10)).unwrap();
    let older = repo.save(&mut uow, Member::with_age("AAA", 20)).unwrap();

    let result = repo
        .find_by_username_and_age_greater_than(&mut uow, "AAA", 15)
        .unwrap();
    assert_eq!(result.len(), 1);
    assert!(result[0].is_same(&older));
    assert_eq!(result[0].borrow().age, 20);
}

#[test]
fn top3_limits_rows_in_id_order() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for name in ["m1", "m2", "m3", "m4"] {
        repo.save(&mut uow, Member::new(name)).unwrap();
    }

    let top = repo.find_top3_hello(&mut uow).unwrap();
    assert_eq!(usernames(&top), vec!["m1", "m2", "m3"]);
}

#[test]
fn find_by_names_matches_the_in_list() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    repo.save(&mut uow, Member::new("AAA")).unwrap();
    repo.save(&mut uow, Member::new("BBB")).unwrap();
    repo.save(&mut uow, Member::new("CCC")).unwrap();

    let found = repo.find_by_names(&mut uow, &["AAA", "CCC"]).unwrap();
    assert_eq!(usernames(&found), vec!["AAA", "CCC"]);
    assert!(repo.find_by_names(&mut uow, &[]).unwrap().is_empty());
}

#[test]
fn optional_and_single_finders_report_zero_and_many() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    assert!(repo
        .find_optional_by_username(&mut uow, "nobody")
        .unwrap()
        .is_none());
    assert!(repo
        .find_member_by_username(&mut uow, "nobody")
        .unwrap()
        .is_none());
    assert!(repo
        .find_list_by_username(&mut uow, "nobody")
        .unwrap()
        .is_empty());

    repo.save(&mut uow, Member::new("AAA")).unwrap();
    let one = repo.find_optional_by_username(&mut uow, "AAA").unwrap();
    assert_eq!(one.unwrap().borrow().username, "AAA");

    repo.save(&mut uow, Member::new("AAA")).unwrap();
    let err = repo
        .find_optional_by_username(&mut uow, "AAA")
        .expect_err("two matches must fail");
    assert!(matches!(err, RepoError::NonUniqueResult { .. }));
    assert!(matches!(
        repo.find_member_by_username(&mut uow, "AAA"),
        Err(RepoError::NonUniqueResult { .. })
    ));
}

#[test]
fn paging_reports_totals_and_navigation() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for index in 1..=5 {
        repo.save(&mut uow, Member::with_age(format!("member{index}"), 10))
            .unwrap();
    }

    let request = PageRequest::of_direction(0, 3, Direction::Desc, &["username"]).unwrap();
    let page = repo.find_by_age(&mut uow, 10, &request).unwrap();

    assert_eq!(page.content.len(), 3);
    assert_eq!(page.total_elements, 5);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.number, 0);
    assert!(page.is_first);
    assert!(page.has_next);
    assert_eq!(usernames(&page.content), vec!["member5", "member4", "member3"]);

    let last = repo.find_by_age(&mut uow, 10, &request.next()).unwrap();
    assert_eq!(usernames(&last.content), vec!["member2", "member1"]);
    assert!(!last.has_next);
    assert!(!last.is_first);
}

#[test]
fn page_content_maps_into_dtos() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for index in 1..=4 {
        repo.save(&mut uow, Member::with_age(format!("member{index}"), 10))
            .unwrap();
    }

    let request = PageRequest::of(0, 3).unwrap();
    let page = repo
        .find_page(&mut uow, &[Predicate::eq("age", 10)], &request)
        .unwrap()
        .map(|member| repokit_core::MemberDto::from_member(&member.borrow(), None));

    assert_eq!(page.content.len(), 3);
    assert_eq!(page.total_elements, 4);
    assert!(page
        .content
        .iter()
        .all(|dto| dto.as_ref().is_some_and(|dto| dto.team_name.is_none())));
    assert_eq!(
        repokit_core::MemberDto::from_member(&Member::with_age("transient", 10), None),
        None
    );
}

#[test]
fn slicing_looks_ahead_and_omits_totals() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for index in 1..=5 {
        repo.save(&mut uow, Member::with_age(format!("member{index}"), 10))
            .unwrap();
    }

    let request = PageRequest::of_direction(0, 3, Direction::Desc, &["username"]).unwrap();
    let slice = repo.find_slice_by_age(&mut uow, 10, &request).unwrap();

    assert_eq!(slice.content.len(), 3);
    assert!(slice.has_next);
    assert!(slice.is_first);

    let json = serde_json::to_value(&slice).unwrap();
    let object = json.as_object().unwrap();
    assert!(!object.contains_key("total_elements"));
    assert!(!object.contains_key("total_pages"));
    assert_eq!(object["content"][0]["username"], "member5");

    let rest = repo.find_slice_by_age(&mut uow, 10, &request.next()).unwrap();
    assert_eq!(rest.content.len(), 2);
    assert!(!rest.has_next);
}

#[test]
fn page_size_above_the_configured_maximum_is_rejected() {
    let mut conn = setup();
    let config = RepositoryConfig {
        max_page_size: 2,
        ..RepositoryConfig::default()
    };
    let repo = MemberRepository::new(config).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let request = PageRequest::of(0, 3).unwrap();
    assert!(matches!(
        repo.find_page(&mut uow, &[], &request),
        Err(RepoError::Query(repokit_core::QueryError::InvalidPageRequest(_)))
    ));
}

#[test]
fn bulk_update_leaves_loaded_instances_stale_until_refresh() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for (index, age) in [10, 19, 20, 21, 40].into_iter().enumerate() {
        repo.save(&mut uow, Member::with_age(format!("member{}", index + 1), age))
            .unwrap();
    }
    let member5 = repo
        .find_member_by_username(&mut uow, "member5")
        .unwrap()
        .unwrap();

    let updated = repo.bulk_age_plus(&mut uow, 20).unwrap();
    assert_eq!(updated, 3);

    assert_eq!(member5.borrow().age, 40);
    let again = repo
        .find_member_by_username(&mut uow, "member5")
        .unwrap()
        .unwrap();
    assert!(again.is_same(&member5));
    assert_eq!(again.borrow().age, 40);

    repo.refresh(&mut uow, &member5).unwrap();
    assert_eq!(member5.borrow().age, 41);

    uow.clear();
    let ages: Vec<i64> = repo
        .find_all(&mut uow)
        .unwrap()
        .iter()
        .map(|member| member.borrow().age)
        .collect();
    assert_eq!(ages, vec![10, 19, 21, 22, 41]);
}

#[test]
fn clear_after_bulk_update_drops_stale_instances() {
    let mut conn = setup();
    let config = RepositoryConfig {
        clear_after_bulk_update: true,
        ..RepositoryConfig::default()
    };
    let repo = MemberRepository::new(config).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let member = repo.save(&mut uow, Member::with_age("member1", 30)).unwrap();
    repo.bulk_age_plus(&mut uow, 20).unwrap();
    assert_eq!(uow.managed_count(), 0);

    let reloaded = repo
        .find_member_by_username(&mut uow, "member1")
        .unwrap()
        .unwrap();
    assert!(!reloaded.is_same(&member));
    assert_eq!(reloaded.borrow().age, 31);
}

#[test]
fn find_all_twice_returns_equal_sequences() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for name in ["c", "a", "b"] {
        repo.save(&mut uow, Member::new(name)).unwrap();
    }

    let first = repo.find_all(&mut uow).unwrap();
    let second = repo.find_all(&mut uow).unwrap();
    assert_eq!(first, second);
    assert!(first.iter().zip(&second).all(|(a, b)| a.is_same(b)));
    assert_eq!(usernames(&first), vec!["c", "a", "b"]);
}

#[test]
fn delete_of_missing_row_follows_policy() {
    let mut conn = setup();
    let lenient = members();
    let strict = MemberRepository::new(RepositoryConfig {
        on_missing_delete: MissingDeletePolicy::Error,
        ..RepositoryConfig::default()
    })
    .unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    lenient.delete_by_id(&mut uow, &999).unwrap();
    let err = strict
        .delete_by_id(&mut uow, &999)
        .expect_err("missing row must fail under the error policy");
    assert!(matches!(err, RepoError::NotFound { entity: "Member", .. }));

    let transient = Managed::new(Member::new("never saved"));
    lenient.delete(&mut uow, &transient).unwrap();
    assert!(strict.delete(&mut uow, &transient).is_err());
}

#[test]
fn read_only_results_are_detached() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let saved = repo.save(&mut uow, Member::with_age("member1", 10)).unwrap();
    let read_only = repo.find_read_only_by_username(&mut uow, "member1").unwrap();
    assert_eq!(read_only.len(), 1);
    assert!(!read_only[0].is_same(&saved));
    assert!(!uow.contains(&read_only[0]));

    read_only[0].borrow_mut().username = "member2".to_string();
    assert_eq!(saved.borrow().username, "member1");
}

#[test]
fn lock_hint_is_accepted_on_sqlite() {
    let mut conn = setup();
    let repo = members();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    repo.save(&mut uow, Member::new("member1")).unwrap();
    let locked = repo.find_lock_by_username(&mut uow, "member1").unwrap();
    assert_eq!(locked.len(), 1);
}

#[test]
fn hand_written_queries_read_members_and_teams() {
    let mut conn = setup();
    let repo = members();
    let teams = TeamRepository::new(RepositoryConfig::default());
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let team = teams.save(&mut uow, Team::new("teamA")).unwrap();
    repo.save(&mut uow, Member::with_team("AAA", 10, &team.borrow()))
        .unwrap();
    repo.save(&mut uow, Member::with_age("BBB", 20)).unwrap();

    let users = repo.find_user(&mut uow, "AAA", 10).unwrap();
    assert_eq!(usernames(&users), vec!["AAA"]);
    assert!(repo.find_user(&mut uow, "AAA", 11).unwrap().is_empty());

    assert_eq!(repo.find_username_list(&mut uow).unwrap(), vec!["AAA", "BBB"]);

    let dtos = repo.find_member_dto(&mut uow).unwrap();
    assert_eq!(dtos.len(), 1);
    assert_eq!(dtos[0].username, "AAA");
    assert_eq!(dtos[0].team_name.as_deref(), Some("teamA"));

    let projected = repo.find_usernames_by_username(&mut uow, "BBB").unwrap();
    assert_eq!(projected.len(), 1);
    assert_eq!(projected[0].username, "BBB");
}

#[test]
fn fetch_join_manages_member_and_team_together() {
    let mut conn = setup();
    let repo = members();
    let teams = TeamRepository::new(RepositoryConfig::default());
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let team_a = teams.save(&mut uow, Team::new("teamA")).unwrap();
    let team_b = teams.save(&mut uow, Team::new("teamB")).unwrap();
    repo.save(&mut uow, Member::with_team("member1", 10, &team_a.borrow()))
        .unwrap();
    repo.save(&mut uow, Member::with_team("member2", 10, &team_b.borrow()))
        .unwrap();
    uow.clear();

    let rows = repo.find_with_team_by_username(&mut uow, "member1").unwrap();
    assert_eq!(rows.len(), 1);
    let (member, team) = &rows[0];
    let team = team.as_ref().unwrap();
    assert_eq!(team.borrow().name, "teamA");

    let team_id = member.borrow().team_id.unwrap();
    let by_id = teams.find_by_id(&mut uow, &team_id).unwrap().unwrap();
    assert!(by_id.is_same(team));
}

#[test]
fn members_are_navigable_from_their_team() {
    let mut conn = setup();
    let repo = members();
    let teams = TeamRepository::new(RepositoryConfig::default());
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let team = teams.save(&mut uow, Team::new("teamA")).unwrap();
    repo.save(&mut uow, Member::with_team("member1", 10, &team.borrow()))
        .unwrap();
    repo.save(&mut uow, Member::with_team("member2", 20, &team.borrow()))
        .unwrap();
    repo.save(&mut uow, Member::new("loner")).unwrap();

    let in_team = repo.find_by_team(&mut uow, &team.borrow()).unwrap();
    assert_eq!(usernames(&in_team), vec!["member1", "member2"]);
    assert!(repo
        .find_by_team(&mut uow, &Team::new("unsaved"))
        .unwrap()
        .is_empty());
    assert_eq!(repo.count_by_age(&mut uow, 10).unwrap(), 1);
}

#[test]
fn rolled_back_unit_of_work_leaves_no_rows() {
    let mut conn = setup();
    let repo = members();

    {
        let mut uow = UnitOfWork::begin(&mut conn).unwrap();
        repo.save(&mut uow, Member::new("temporary")).unwrap();
        uow.rollback().unwrap();
    }
    {
        let mut uow = UnitOfWork::begin(&mut conn).unwrap();
        repo.save(&mut uow, Member::new("dropped")).unwrap();
    }

    let mut uow = UnitOfWork::begin(&mut conn).unwrap();
    assert_eq!(repo.count(&mut uow).unwrap(), 0);
}
