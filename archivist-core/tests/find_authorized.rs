/*
    Authorized Collection Listing Tests

    The policy-query listing must agree with checking every collection one
    by one, whatever mix of direct, group, nested-group and community ADMIN
    grants is in place.
*/

use archivist_core::config::Config;
use archivist_core::core_authz::{Action, AuthorizeService};
use archivist_core::core_model::Collection;
use archivist_core::core_store::{CollectionId, EPersonId, GroupId, ResourceRef};
use archivist_core::test_utils::*;

/// Two top-level communities, one nested community and four collections,
/// the last of which is shared between both top-level communities
struct Tree {
    t: TestRepository,
    resources: Vec<ResourceRef>,
    collections: Vec<CollectionId>,
    member: GroupId,
    outer: GroupId,
    unrelated: GroupId,
}

fn build_tree() -> Tree {
    let mut config = Config::default();
    config.features.find_authorized_optimize = true;
    let t = TestRepository::with_config(config);

    let t1 = t.seed_community("T1");
    let s1 = t.seed_community_under(Some(&t1.id), "S1");
    let t2 = t.seed_community("T2");
    let c1 = t.seed_collection(&t1.id, "C1");
    let c2 = t.seed_collection(&s1.id, "C2");
    let c3 = t.seed_collection(&t2.id, "C3");
    let c4 = t.seed_collection(&t1.id, "C4");
    t.as_admin(|ctx| t.repo.communities().add_collection(ctx, &t2.id, &c4.id));

    let member = t.group_with("Members", &[t.user]);
    let outer = t.group_with("Outer", &[]);
    t.store.add_subgroup(&outer, &member).unwrap();
    let unrelated = t.group_with("Unrelated", &[]);

    Tree {
        resources: vec![
            t1.id.into(),
            s1.id.into(),
            t2.id.into(),
            c1.id.into(),
            c2.id.into(),
            c3.id.into(),
            c4.id.into(),
        ],
        collections: vec![c1.id, c2.id, c3.id, c4.id],
        t,
        member,
        outer,
        unrelated,
    }
}

fn ids(collections: Vec<Collection>) -> Vec<CollectionId> {
    let mut ids: Vec<CollectionId> = collections.into_iter().map(|c| c.id).collect();
    ids.sort();
    ids
}

fn both_listings(tree: &Tree, actor: Option<EPersonId>, action: Action) -> (Vec<CollectionId>, Vec<CollectionId>) {
    let collections = tree.t.repo.collections();
    tree.t
        .run_as(actor, |ctx| {
            let plain = collections.find_authorized(ctx, None, action)?;
            let optimized = collections.find_authorized_optimized(ctx, action)?;
            Ok((ids(plain), ids(optimized)))
        })
        .unwrap()
}

#[test]
fn test_community_admin_sees_collections_below() {
    let tree = build_tree();
    let authz = tree.t.repo.services().authz.clone();
    authz
        .create_resource_policy(tree.resources[0], Some(tree.outer), None, Action::Admin, None)
        .unwrap();

    let (plain, optimized) = both_listings(&tree, Some(tree.t.user), Action::Add);
    assert_eq!(plain, optimized);
    let mut expected = vec![tree.collections[0], tree.collections[1], tree.collections[3]];
    expected.sort();
    assert_eq!(optimized, expected);
}

#[test]
fn test_unrelated_grants_are_ignored() {
    let tree = build_tree();
    let authz = tree.t.repo.services().authz.clone();
    authz
        .create_resource_policy(tree.resources[5], Some(tree.unrelated), None, Action::Write, None)
        .unwrap();

    let (plain, optimized) = both_listings(&tree, Some(tree.t.user), Action::Write);
    assert!(plain.is_empty());
    assert!(optimized.is_empty());
}

#[test]
fn test_site_admin_sees_everything() {
    let tree = build_tree();
    let (plain, optimized) = both_listings(&tree, Some(tree.t.admin), Action::Admin);
    assert_eq!(plain.len(), 4);
    assert_eq!(plain, optimized);
}

#[test]
fn test_disabled_optimization_falls_back() {
    let t = TestRepository::new();
    let x = t.seed_community("X");
    let y = t.seed_collection(&x.id, "Y");
    t.repo
        .services()
        .authz
        .create_resource_policy(y.id.into(), None, Some(t.user), Action::Add, None)
        .unwrap();
    let listed = t
        .as_user(|ctx| t.repo.collections().find_authorized_optimized(ctx, Action::Add))
        .unwrap();
    assert_eq!(ids(listed), vec![y.id]);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    const ACTIONS: [Action; 4] = [Action::Read, Action::Add, Action::Admin, Action::Write];
    const QUERIES: [Action; 3] = [Action::Add, Action::Read, Action::Write];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_optimized_listing_matches_plain(
            grants in prop::collection::vec((0usize..7, 0usize..4, 0usize..5), 0..8),
            query in 0usize..3,
            anonymous in any::<bool>(),
        ) {
            let tree = build_tree();
            let authz = tree.t.repo.services().authz.clone();
            let anonymous_group = tree.t.repo.services().anonymous_group().unwrap().id;

            for (resource, action, principal) in grants {
                let (group, eperson) = match principal {
                    0 => (None, Some(tree.t.user)),
                    1 => (Some(tree.member), None),
                    2 => (Some(tree.outer), None),
                    3 => (Some(tree.unrelated), None),
                    _ => (Some(anonymous_group), None),
                };
                authz
                    .create_resource_policy(tree.resources[resource], group, eperson, ACTIONS[action], None)
                    .unwrap();
            }

            let actor = if anonymous { None } else { Some(tree.t.user) };
            let (plain, optimized) = both_listings(&tree, actor, QUERIES[query]);
            prop_assert_eq!(plain, optimized);
        }
    }
}
