/*
    Cascade Delete Tests

    Removal of communities, collections and items, checking that:
    - Whole subtrees disappear with their handles, policies and groups
    - Shared collections and items only lose the removed link
    - Events come out in lifecycle order
    - A denial anywhere in the cascade leaves the repository untouched
*/

use archivist_core::core_authz::{Action, AuthorizeService};
use archivist_core::core_event::EventKind;
use archivist_core::core_store::{ContentStore, ResourceKind, ResourceRef};
use archivist_core::test_utils::*;

#[test]
fn test_community_delete_removes_subtree() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let w = t.seed_community_under(Some(&x.id), "W");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");

    t.events.clear();
    t.as_admin(|ctx| t.repo.communities().delete(ctx, &x.id));

    assert!(t.repo.communities().find(&x.id).unwrap().is_none());
    assert!(t.repo.communities().find(&w.id).unwrap().is_none());
    assert!(t.repo.collections().find(&y.id).unwrap().is_none());
    assert!(t.repo.items().find(&z.id).unwrap().is_none());
    assert_eq!(t.store.handle_of(x.id).unwrap(), None);
    assert_eq!(t.store.handle_of(y.id).unwrap(), None);
    assert_eq!(t.store.handle_of(z.id).unwrap(), None);
    assert_eq!(t.store.handle_of(w.id).unwrap(), None);
    assert!(t
        .repo
        .services()
        .authz
        .get_policies(y.id.into())
        .unwrap()
        .is_empty());

    let events = t.committed();
    let last = events.last().unwrap();
    assert_eq!(last.kind(), EventKind::Remove);
    assert_eq!(last.subject().kind, ResourceKind::Site);
    assert_eq!(last.object(), Some(ResourceRef::from(x.id)));
    let site_removals = events
        .iter()
        .filter(|e| e.kind() == EventKind::Remove && e.subject().kind == ResourceKind::Site)
        .count();
    assert_eq!(site_removals, 1);

    let deleted: Vec<ResourceKind> = events
        .iter()
        .filter(|e| e.kind() == EventKind::Delete)
        .map(|e| e.subject().kind)
        .collect();
    assert_eq!(
        deleted,
        vec![
            ResourceKind::Community,
            ResourceKind::Collection,
            ResourceKind::Item,
            ResourceKind::Community,
        ]
    );
    assert_eq!(events[0].kind(), EventKind::Delete);
    assert_eq!(events[0].subject(), ResourceRef::from(x.id));
}

#[test]
fn test_child_removal_event_follows_its_subtree() {
    let t = TestRepository::new();
    let root = t.seed_community("Root");
    let a = t.seed_community_under(Some(&root.id), "A");
    let b = t.seed_community_under(Some(&a.id), "B");
    let inner = t.seed_collection(&b.id, "Inner");

    t.events.clear();
    t.as_admin(|ctx| t.repo.communities().remove_subcommunity(ctx, &root.id, &a.id));

    let communities = t.repo.communities();
    assert!(communities.find(&a.id).unwrap().is_none());
    assert!(communities.find(&b.id).unwrap().is_none());
    assert!(t.repo.collections().find(&inner.id).unwrap().is_none());
    assert!(communities.get(&root.id).unwrap().subcommunities.is_empty());

    let events = t.committed();
    let last = events.last().unwrap();
    assert_eq!(last.kind(), EventKind::Remove);
    assert_eq!(last.subject(), ResourceRef::from(root.id));
    assert_eq!(last.object(), Some(ResourceRef::from(a.id)));
    let b_removed = events
        .iter()
        .position(|e| e.kind() == EventKind::Remove && e.object() == Some(ResourceRef::from(b.id)))
        .unwrap();
    let b_deleted = events
        .iter()
        .position(|e| e.kind() == EventKind::Delete && e.subject() == ResourceRef::from(b.id))
        .unwrap();
    assert!(b_deleted < b_removed);
}

#[test]
fn test_removing_an_unrelated_child_fails() {
    let t = TestRepository::new();
    let root = t.seed_community("Root");
    let stranger = t.seed_community("Stranger");
    let result = t.run_as(Some(t.admin), |ctx| {
        t.repo.communities().remove_subcommunity(ctx, &root.id, &stranger.id)
    });
    assert!(matches!(result, Err(archivist_core::Error::InvalidArgument(_))));
    assert!(t.repo.communities().find(&stranger.id).unwrap().is_some());
}

#[test]
fn test_shared_collection_survives_parent_delete() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let other = t.seed_community("Other");
    let shared = t.seed_collection(&x.id, "Shared");
    let item = t.install_item(&shared.id, "Kept");
    t.as_admin(|ctx| t.repo.communities().add_collection(ctx, &other.id, &shared.id));

    t.as_admin(|ctx| t.repo.communities().delete(ctx, &x.id));

    let survivor = t.repo.collections().get(&shared.id).unwrap();
    assert_eq!(survivor.communities, vec![other.id]);
    assert!(t.repo.items().find(&item.id).unwrap().is_some());
    assert_eq!(
        t.repo.communities().get(&other.id).unwrap().collections,
        vec![shared.id]
    );
}

#[test]
fn test_item_removal_depends_on_remaining_collections() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let first = t.seed_collection(&x.id, "First");
    let second = t.seed_collection(&x.id, "Second");
    let shared = t.install_item(&first.id, "Shared");
    let single = t.install_item(&first.id, "Single");
    let collections = t.repo.collections();
    let items = t.repo.items();
    t.as_admin(|ctx| collections.add_item(ctx, &second.id, &shared.id));

    t.as_admin(|ctx| collections.remove_item(ctx, &first.id, &shared.id));
    let kept = items.get(&shared.id).unwrap();
    assert_eq!(kept.collections, vec![second.id]);
    assert_eq!(kept.owning_collection, Some(second.id));
    assert!(!collections.get(&first.id).unwrap().items.contains(&shared.id));

    t.as_admin(|ctx| collections.remove_item(ctx, &first.id, &single.id));
    assert!(items.find(&single.id).unwrap().is_none());
    assert!(collections.get(&first.id).unwrap().items.is_empty());

    let missing = t.run_as(Some(t.admin), |ctx| {
        collections.remove_item(ctx, &first.id, &shared.id)
    });
    assert!(matches!(missing, Err(archivist_core::Error::InvalidArgument(_))));
}

#[test]
fn test_item_delete_drops_files_and_versions() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    let items = t.repo.items();
    let file = t.as_admin(|ctx| items.create_single_bitstream(ctx, &z.id, "data.csv", b"1,2,3"));
    t.store.register_version(&z.id, 2).unwrap();
    t.store.mark_item_harvested(&z.id).unwrap();

    t.events.clear();
    t.as_admin(|ctx| items.delete(ctx, &z.id));

    assert!(items.find(&z.id).unwrap().is_none());
    assert!(t.store.bitstreams().find(&file.id).unwrap().is_none());
    assert!(t.repo.collections().get(&y.id).unwrap().items.is_empty());
    assert_eq!(
        t.event_shapes(),
        vec![
            (EventKind::Delete, ResourceKind::Item),
            (EventKind::Remove, ResourceKind::Item),
        ]
    );
}

#[test]
fn test_denied_step_rolls_back_whole_cascade() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let w = t.seed_community_under(Some(&x.id), "W");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    t.repo
        .services()
        .authz
        .create_resource_policy(x.id.into(), None, Some(t.user), Action::Delete, None)
        .unwrap();
    let policies_before = t.store.policy_count().unwrap();

    t.events.clear();
    assert_denied(t.as_user(|ctx| t.repo.communities().delete(ctx, &x.id)));

    assert!(t.repo.communities().find(&x.id).unwrap().is_some());
    assert!(t.repo.communities().find(&w.id).unwrap().is_some());
    assert!(t.repo.collections().find(&y.id).unwrap().is_some());
    assert!(t.repo.items().find(&z.id).unwrap().is_some());
    assert_eq!(t.store.handle_of(y.id).unwrap(), y.handle);
    assert_eq!(t.store.policy_count().unwrap(), policies_before);
    assert!(t.committed().is_empty());
}

#[test]
fn test_collection_delete_cleans_up_collaborators() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    let z = t.install_item(&y.id, "Z");
    let collections = t.repo.collections();

    let (submitters, admins, reviewers, template, logo) = t.as_admin(|ctx| {
        let submitters = collections.create_submitters(ctx, &y.id)?;
        let admins = collections.create_administrators(ctx, &y.id)?;
        let reviewers = collections.create_workflow_group(ctx, &y.id, 1)?;
        let template = collections.create_template_item(ctx, &y.id)?;
        let logo = collections.set_logo(ctx, &y.id, Some(b"png".as_slice()))?;
        Ok((submitters, admins, reviewers, template, logo))
    });
    let logo = logo.unwrap();
    t.store.mark_harvested(&y.id).unwrap();
    t.store.subscribe(&t.user, &y.id).unwrap();
    t.store.add_workflow_task(&y.id).unwrap();
    t.store.add_workflow_item(&y.id).unwrap();
    let pending = t.as_admin(|ctx| t.repo.items().create(ctx));
    t.store.start_submission(&y.id, Some(pending.id)).unwrap();

    t.events.clear();
    t.as_admin(|ctx| collections.delete(ctx, &y.id));

    assert!(collections.find(&y.id).unwrap().is_none());
    assert!(t.repo.items().find(&z.id).unwrap().is_none());
    assert!(t.repo.items().find(&template).unwrap().is_none());
    assert!(t.repo.items().find(&pending.id).unwrap().is_none());
    assert!(t.store.bitstreams().find(&logo).unwrap().is_none());
    for group in [submitters.id, admins.id, reviewers.id] {
        assert!(!t.store.group_exists(&group).unwrap());
    }
    assert!(!t.store.is_harvested(&y.id).unwrap());
    assert_eq!(t.store.subscription_count(&y.id).unwrap(), 0);
    assert_eq!(t.store.workflow_counts(&y.id).unwrap(), (0, 0));
    assert_eq!(t.store.handle_of(y.id).unwrap(), None);
    assert!(t.repo.communities().get(&x.id).unwrap().collections.is_empty());

    let events = t.committed();
    assert_eq!(events[0].kind(), EventKind::Delete);
    assert_eq!(events[0].subject(), ResourceRef::from(y.id));
    assert_event_with_detail(&events, EventKind::Modify, "remove_template_item");
}
