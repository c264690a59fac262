/*
    Lifecycle Scenario Tests

    Drives the managers through whole request transactions against the
    in-memory repository:
    - Container creation rules and handle allocation
    - Edit rights inherited from parent communities
    - Withdraw / reinstate with provenance and policy changes
    - Role groups, template items and bitstream numbering
    - Rollback of a failed transaction
*/

use archivist_core::config::Config;
use archivist_core::core_authz::{Action, AuthorizeService, PolicyType};
use archivist_core::core_event::EventKind;
use archivist_core::core_store::{ContentStore, EPersonId, Page, ResourceKind};
use archivist_core::test_utils::*;
use archivist_core::Error;

#[test]
fn test_withdraw_then_reinstate_scenario() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");

    let authz = t.repo.services().authz.clone();
    let curators = t.group_with("Curators", &[]);
    authz
        .create_resource_policy(z.id.into(), Some(curators), None, Action::Write, Some(PolicyType::Custom))
        .unwrap();

    let items = t.repo.items();
    t.events.clear();
    t.as_admin(|ctx| items.withdraw(ctx, &z.id));

    let withdrawn = items.get(&z.id).unwrap();
    assert!(withdrawn.withdrawn);
    assert!(!withdrawn.in_archive);
    let remaining = authz.get_policies(z.id.into()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].rp_type, Some(PolicyType::Custom));
    assert_event_with_detail(&t.committed(), EventKind::Modify, "WITHDRAW");

    let provenance = items.get_metadata(&withdrawn, "dc.description.provenance").unwrap();
    assert_eq!(provenance.len(), 1);
    assert!(provenance[0].starts_with("Item withdrawn by Site Admin (admin@example.com) on "));
    assert!(provenance[0].contains(&format!("Y (ID: {})", y.id)));
    assert!(provenance[0].ends_with("No. of bitstreams: 0\n"));

    t.as_admin(|ctx| items.reinstate(ctx, &z.id));

    let reinstated = items.get(&z.id).unwrap();
    assert!(!reinstated.withdrawn);
    assert!(reinstated.in_archive);
    let anonymous = t.repo.services().anonymous_group().unwrap();
    let policies = authz.get_policies(z.id.into()).unwrap();
    assert!(policies.iter().any(|p| p.action == Action::Read
        && p.group == Some(anonymous.id)
        && p.rp_type == Some(PolicyType::Inherited)));
    assert!(policies.iter().any(|p| p.rp_type == Some(PolicyType::Custom)));
    assert_event_with_detail(&t.committed(), EventKind::Modify, "REINSTATE");
    assert_eq!(
        items
            .get_metadata(&reinstated, "dc.description.provenance")
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_withdraw_requires_rights_on_owning_collection() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    let items = t.repo.items();

    assert_denied(t.as_user(|ctx| items.withdraw(ctx, &z.id)));

    let admins = t.as_admin(|ctx| t.repo.collections().create_administrators(ctx, &y.id));
    t.store.add_member(&admins.id, &t.user).unwrap();
    assert_ok(t.as_user(|ctx| items.withdraw(ctx, &z.id)));
    assert!(items.get(&z.id).unwrap().withdrawn);
}

#[test]
fn test_disabled_delegation_flag_falls_back_to_remove() {
    let mut config = Config::default();
    config.authorization.collection_admin_withdraw_item = false;
    let t = TestRepository::with_config(config);
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    let items = t.repo.items();

    let admins = t.as_admin(|ctx| t.repo.collections().create_administrators(ctx, &y.id));
    t.store.add_member(&admins.id, &t.user).unwrap();
    assert_denied(t.as_user(|ctx| items.withdraw(ctx, &z.id)));

    t.repo
        .services()
        .authz
        .create_resource_policy(y.id.into(), None, Some(t.user), Action::Remove, None)
        .unwrap();
    assert_ok(t.as_user(|ctx| items.withdraw(ctx, &z.id)));
}

#[test]
fn test_collection_edit_rights_come_from_any_parent_community() {
    let t = TestRepository::new();
    let left = t.seed_community("Left");
    let right = t.seed_community("Right");
    let shared = t.seed_collection(&left.id, "Shared");
    t.as_admin(|ctx| t.repo.communities().add_collection(ctx, &right.id, &shared.id));

    let collections = t.repo.collections();
    let can_edit = |actor: EPersonId| {
        t.run_as(Some(actor), |ctx| collections.can_edit_boolean(ctx, &shared.id, true))
            .unwrap()
    };
    let authz = t.repo.services().authz.clone();

    assert!(!can_edit(t.user));

    authz
        .create_resource_policy(right.id.into(), None, Some(t.user), Action::Add, None)
        .unwrap();
    assert!(can_edit(t.user));

    let writer = t.register("writer@example.com", "Wren Writer");
    assert!(!can_edit(writer));
    authz
        .create_resource_policy(shared.id.into(), None, Some(writer), Action::Write, None)
        .unwrap();
    assert!(can_edit(writer));

    let parent_writer = t.register("pw@example.com", "Pat Writer");
    authz
        .create_resource_policy(left.id.into(), None, Some(parent_writer), Action::Write, None)
        .unwrap();
    assert!(can_edit(parent_writer));
}

#[test]
fn test_community_edit_rights_come_from_ancestors() {
    let t = TestRepository::new();
    let root = t.seed_community("Root");
    let middle = t.seed_community_under(Some(&root.id), "Middle");
    let leaf = t.seed_community_under(Some(&middle.id), "Leaf");
    let communities = t.repo.communities();

    assert!(!t
        .as_user(|ctx| communities.can_edit_boolean(ctx, &leaf.id))
        .unwrap());
    t.repo
        .services()
        .authz
        .create_resource_policy(root.id.into(), None, Some(t.user), Action::Write, None)
        .unwrap();
    assert!(t
        .as_user(|ctx| communities.can_edit_boolean(ctx, &leaf.id))
        .unwrap());

    let parents = communities.get_all_parents(&leaf.id).unwrap();
    let names: Vec<String> = parents
        .iter()
        .map(|c| communities.get_metadata(c, "name").unwrap().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["Middle", "Root"]);
}

#[test]
fn test_top_level_creation_is_reserved_for_admins() {
    let t = TestRepository::new();
    let communities = t.repo.communities();
    assert_denied(t.as_user(|ctx| communities.create(ctx, None, None)));

    let parent = t.seed_community("Parent");
    t.repo
        .services()
        .authz
        .create_resource_policy(parent.id.into(), None, Some(t.user), Action::Add, None)
        .unwrap();
    let child = assert_ok(t.as_user(|ctx| communities.create_subcommunity(ctx, &parent.id, None)));
    assert_eq!(child.parent, Some(parent.id));
    assert!(communities
        .get(&parent.id)
        .unwrap()
        .subcommunities
        .contains(&child.id));
}

#[test]
fn test_create_events_and_site_link() {
    let t = TestRepository::new();
    let community = t.as_admin(|ctx| t.repo.communities().create(ctx, None, None));

    let shapes = t.event_shapes();
    assert_eq!(
        shapes,
        vec![
            (EventKind::Create, ResourceKind::Community),
            (EventKind::Add, ResourceKind::Site),
        ]
    );
    let handle = community.handle.clone().unwrap();
    assert!(handle.starts_with("123456789/"));
    assert_eq!(t.store.handle_of(community.id).unwrap(), Some(handle));

    let anonymous = t.repo.services().anonymous_group().unwrap();
    let read = t
        .repo
        .services()
        .authz
        .get_policies_action_filter(community.id.into(), Action::Read)
        .unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].group, Some(anonymous.id));
}

#[test]
fn test_collection_requires_a_community() {
    let t = TestRepository::new();
    let result = t.run_as(Some(t.admin), |ctx| t.repo.collections().create(ctx, None, None));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_collection_gets_default_read_policies() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let authz = &t.repo.services().authz;
    for action in [Action::Read, Action::DefaultItemRead, Action::DefaultBitstreamRead] {
        assert_eq!(
            authz
                .get_policies_action_filter(y.id.into(), action)
                .unwrap()
                .len(),
            1,
            "missing {}",
            action
        );
    }
    assert_eq!(y.communities, vec![x.id]);
    assert_eq!(t.repo.collections().get_name(&y), "Y");
}

#[test]
fn test_explicit_handle_collision() {
    let t = TestRepository::new();
    let communities = t.repo.communities();
    t.as_admin(|ctx| communities.create(ctx, None, Some("123456789/500")));
    let again = t.run_as(Some(t.admin), |ctx| {
        communities.create(ctx, None, Some("123456789/500"))
    });
    assert!(matches!(again, Err(Error::DuplicateHandle(_))));
    assert_eq!(communities.count_total().unwrap(), 1);
}

#[test]
fn test_failed_transaction_leaves_nothing_behind() {
    let t = TestRepository::new();
    let communities = t.repo.communities();
    let result: archivist_core::Result<()> = t.run_as(Some(t.admin), |ctx| {
        communities.create(ctx, None, None)?;
        Err(Error::InvalidState("abort".to_string()))
    });
    assert!(result.is_err());
    assert_eq!(communities.count_total().unwrap(), 0);
    assert!(t.committed().is_empty());
}

#[test]
fn test_subcommunity_cycles_are_rejected() {
    let t = TestRepository::new();
    let root = t.seed_community("Root");
    let child = t.seed_community_under(Some(&root.id), "Child");
    let communities = t.repo.communities();

    let cycle = t.run_as(Some(t.admin), |ctx| {
        communities.add_subcommunity(ctx, &child.id, &root.id)
    });
    assert!(matches!(cycle, Err(Error::InvalidState(_))));

    let other = t.seed_community("Other");
    let reparent = t.run_as(Some(t.admin), |ctx| {
        communities.add_subcommunity(ctx, &other.id, &child.id)
    });
    assert!(matches!(reparent, Err(Error::InvalidState(_))));
}

#[test]
fn test_workflow_groups() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let collections = t.repo.collections();

    let bad = t.run_as(Some(t.admin), |ctx| collections.create_workflow_group(ctx, &y.id, 4));
    assert!(matches!(bad, Err(Error::InvalidArgument(_))));

    let reviewers = t.as_admin(|ctx| collections.create_workflow_group(ctx, &y.id, 2));
    assert_eq!(reviewers.name, format!("COLLECTION_{}_WORKFLOW_STEP_2", y.id));
    assert_eq!(
        collections.get_workflow_group(&y.id, 2).unwrap(),
        Some(reviewers.id)
    );
    let again = t.as_admin(|ctx| collections.create_workflow_group(ctx, &y.id, 2));
    assert_eq!(again.id, reviewers.id);

    let grants = t
        .repo
        .services()
        .authz
        .get_policies_action_filter(y.id.into(), Action::Add)
        .unwrap();
    assert_eq!(grants.iter().filter(|p| p.group == Some(reviewers.id)).count(), 1);
}

#[test]
fn test_submitter_group_lifecycle() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let collections = t.repo.collections();

    assert_denied(t.as_user(|ctx| collections.create_submitters(ctx, &y.id)));
    let submitters = t.as_admin(|ctx| collections.create_submitters(ctx, &y.id));
    assert_eq!(submitters.name, format!("COLLECTION_{}_SUBMIT", y.id));
    assert_eq!(
        collections.find_by_group(&submitters.id).unwrap().map(|c| c.id),
        Some(y.id)
    );

    t.as_admin(|ctx| collections.remove_submitters(ctx, &y.id));
    assert!(!t.store.group_exists(&submitters.id).unwrap());
    assert_eq!(collections.get(&y.id).unwrap().submitters, None);
    // Removing twice is a no-op
    t.as_admin(|ctx| collections.remove_submitters(ctx, &y.id));
}

#[test]
fn test_template_item_lifecycle() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let collections = t.repo.collections();
    let items = t.repo.items();

    let template = t.as_admin(|ctx| collections.create_template_item(ctx, &y.id));
    let record = items.get(&template).unwrap();
    assert_eq!(record.template_item_of, Some(y.id));
    assert_eq!(items.get_parent_object(&record), Some(y.id));
    assert!(items.find_all(Page::all()).unwrap().is_empty());

    let second = t.as_admin(|ctx| collections.create_template_item(ctx, &y.id));
    assert_eq!(second, template);

    t.events.clear();
    t.as_admin(|ctx| collections.remove_template_item(ctx, &y.id));
    assert!(items.find(&template).unwrap().is_none());
    assert_eq!(collections.get(&y.id).unwrap().template_item, None);
    assert_event_with_detail(&t.committed(), EventKind::Modify, "remove_template_item");
}

#[test]
fn test_bitstream_sequence_numbers() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    let items = t.repo.items();

    let (first, second) = t.as_admin(|ctx| {
        let first = items.create_single_bitstream(ctx, &z.id, "a.pdf", b"aaa")?;
        let second = items.create_single_bitstream(ctx, &z.id, "b.pdf", b"bbbb")?;
        items.update(ctx, &z.id)?;
        Ok((first, second))
    });
    let sequence = |id| t.store.bitstreams().find(id).unwrap().unwrap().sequence_id;
    assert_eq!(sequence(&first.id), Some(1));
    assert_eq!(sequence(&second.id), Some(2));

    let third = t.as_admin(|ctx| {
        let third = items.create_single_bitstream(ctx, &z.id, "c.pdf", b"c")?;
        items.update(ctx, &z.id)?;
        Ok(third)
    });
    assert_eq!(sequence(&third.id), Some(3));

    let item = items.get(&z.id).unwrap();
    assert!(items.has_uploaded_files(&item).unwrap());
    assert_eq!(items.get_non_internal_bitstreams(&item).unwrap().len(), 3);
    assert_eq!(items.get_bundles(&item, "ORIGINAL").unwrap().len(), 3);
}

#[test]
fn test_item_update_only_reports_real_changes() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    let items = t.repo.items();

    t.events.clear();
    t.as_admin(|ctx| items.update(ctx, &z.id));
    assert!(t.committed().is_empty());

    t.as_admin(|ctx| {
        items.add_metadata(ctx, &z.id, "dc.subject", Some("en"), "physics")?;
        items.update(ctx, &z.id)
    });
    assert_eq!(
        t.event_shapes(),
        vec![
            (EventKind::ModifyMetadata, ResourceKind::Item),
            (EventKind::Modify, ResourceKind::Item),
        ]
    );
    assert_eq!(t.committed()[0].detail(), Some("dc.subject"));
}

#[test]
fn test_metadata_changes_require_edit_rights() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    let communities = t.repo.communities();
    let collections = t.repo.collections();
    let items = t.repo.items();

    for actor in [None, Some(t.user)] {
        assert_denied(t.run_as(actor, |ctx| communities.set_metadata(ctx, &x.id, "name", Some("Renamed"))));
        assert_denied(t.run_as(actor, |ctx| collections.set_metadata(ctx, &y.id, "name", Some("Renamed"))));
        assert_denied(t.run_as(actor, |ctx| items.set_metadata(ctx, &z.id, "dc.title", Some("Renamed"))));
        assert_denied(t.run_as(actor, |ctx| {
            items.add_metadata(ctx, &z.id, "dc.subject", None, "physics")
        }));
    }

    let community = communities.get(&x.id).unwrap();
    assert_eq!(communities.get_metadata(&community, "name").unwrap().as_deref(), Some("X"));
    assert_eq!(collections.get_name(&collections.get(&y.id).unwrap()), "Y");
    let item = items.get(&z.id).unwrap();
    assert_eq!(items.get_metadata(&item, "dc.title").unwrap(), vec!["Z".to_string()]);
    assert!(items.get_metadata(&item, "dc.subject").unwrap().is_empty());
}

#[test]
fn test_item_write_grant_allows_metadata_changes() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    let items = t.repo.items();
    let writers = t.group_with("Writers", &[t.user]);
    t.repo
        .services()
        .authz
        .add_policy(z.id.into(), Action::Write, writers)
        .unwrap();

    t.as_user(|ctx| {
        items.set_metadata(ctx, &z.id, "dc.title", Some("Renamed"))?;
        items.update(ctx, &z.id)
    })
    .unwrap();
    let item = items.get(&z.id).unwrap();
    assert_eq!(items.get_metadata(&item, "dc.title").unwrap(), vec!["Renamed".to_string()]);
}

#[test]
fn test_unowned_items_are_editable_only_as_templates() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let items = t.repo.items();

    let draft = t.as_admin(|ctx| items.create(ctx));
    assert_eq!(draft.owning_collection, None);
    assert!(!t.as_user(|ctx| items.can_edit(ctx, &draft.id)).unwrap());
    assert_denied(t.as_user(|ctx| items.set_metadata(ctx, &draft.id, "dc.title", Some("Draft"))));

    let template = t.as_admin(|ctx| t.repo.collections().create_template_item(ctx, &y.id));
    assert!(t.as_user(|ctx| items.can_edit(ctx, &template)).unwrap());
}

#[test]
fn test_collection_add_event_carries_handle() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    t.events.clear();

    let y = t.as_admin(|ctx| t.repo.collections().create(ctx, Some(&x.id), None));
    let handle = y.handle.clone().unwrap();
    let add = t
        .committed()
        .into_iter()
        .find(|e| e.kind() == EventKind::Add)
        .unwrap();
    assert_eq!(add.subject().kind, ResourceKind::Community);
    assert_eq!(add.detail(), Some(handle.as_str()));
}

#[test]
fn test_item_listing_and_counts() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let sub = t.seed_community_under(Some(&x.id), "Sub");
    let y = t.seed_collection(&x.id, "Y");
    let w = t.seed_collection(&sub.id, "W");
    let a = t.install_item(&y.id, "A");
    let b = t.install_item(&w.id, "B");
    let items = t.repo.items();

    t.as_admin(|ctx| t.repo.collections().add_item(ctx, &w.id, &a.id));
    assert_eq!(items.count_items(&w.id).unwrap(), 2);
    assert_eq!(items.count_items_in_community(&x.id).unwrap(), 2);
    assert_eq!(items.count_withdrawn().unwrap(), 0);

    let reader = t.as_user(|ctx| items.is_item_listed_for_user(ctx, &b)).unwrap();
    assert!(reader);
    let communities = items.get_communities(&items.get(&b.id).unwrap()).unwrap();
    let ids: Vec<_> = communities.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![sub.id, x.id]);

    let not_linked = items.get_collections_not_linked(&items.get(&b.id).unwrap()).unwrap();
    assert_eq!(not_linked.iter().map(|c| c.id).collect::<Vec<_>>(), vec![y.id]);
}
