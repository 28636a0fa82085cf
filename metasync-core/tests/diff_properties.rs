//! Diff engine properties over disjoint path families:
//! A unchanged, B changed, C local-only, D remote-only.

use std::collections::BTreeSet;

use metasync_core::{diff_for_download, diff_for_upload, Fingerprint, FileMap, Manifest};
use rstest::rstest;

struct Families {
    local: Manifest,
    remote: Manifest,
    changed: BTreeSet<String>,
    local_only: BTreeSet<String>,
    remote_only: BTreeSet<String>,
}

fn names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}/{i:03}.dat")).collect()
}

fn fp(tag: &str, path: &str) -> Fingerprint {
    Fingerprint::from(format!("{tag}:{path}"))
}

fn families(a: usize, b: usize, c: usize, d: usize) -> Families {
    let (a, b, c, d) = (names("a", a), names("b", b), names("c", c), names("d", d));

    let mut local = FileMap::new();
    let mut remote = FileMap::new();
    for p in &a {
        local.insert(p.clone(), fp("same", p));
        remote.insert(p.clone(), fp("same", p));
    }
    for p in &b {
        local.insert(p.clone(), fp("new", p));
        remote.insert(p.clone(), fp("old", p));
    }
    for p in &c {
        local.insert(p.clone(), fp("local", p));
    }
    for p in &d {
        remote.insert(p.clone(), fp("remote", p));
    }

    Families {
        local: Manifest::new(local, false),
        remote: Manifest::new(remote, false),
        changed: b.into_iter().collect(),
        local_only: c.into_iter().collect(),
        remote_only: d.into_iter().collect(),
    }
}

#[rstest]
#[case::all_empty(0, 0, 0, 0)]
#[case::only_unchanged(5, 0, 0, 0)]
#[case::only_changed(0, 4, 0, 0)]
#[case::only_local(0, 0, 3, 0)]
#[case::only_remote(0, 0, 0, 6)]
#[case::mixed(7, 3, 2, 4)]
#[case::large(200, 50, 25, 75)]
fn upload_transfers_changed_and_local_only(
    #[case] a: usize,
    #[case] b: usize,
    #[case] c: usize,
    #[case] d: usize,
) {
    let f = families(a, b, c, d);
    let plan = diff_for_upload(&f.local, &f.remote, &BTreeSet::new());

    let expected: BTreeSet<String> = f.changed.union(&f.local_only).cloned().collect();
    assert_eq!(plan.to_transfer, expected);
    assert_eq!(plan.to_delete, f.remote_only);
}

#[rstest]
#[case::mixed(7, 3, 2, 4)]
#[case::no_remote_only(3, 3, 3, 0)]
fn download_mirrors_upload_with_roles_swapped(
    #[case] a: usize,
    #[case] b: usize,
    #[case] c: usize,
    #[case] d: usize,
) {
    let f = families(a, b, c, d);
    // Downloading `remote` over `local`: remote-only arrives, local-only goes.
    let plan = diff_for_download(&f.remote, Some(&f.local));

    let expected: BTreeSet<String> = f.changed.union(&f.remote_only).cloned().collect();
    assert_eq!(plan.to_transfer, expected);
    assert_eq!(plan.to_delete, f.local_only);
}

#[test]
fn second_upload_of_same_tree_is_empty() {
    let f = families(10, 4, 3, 2);
    let first = diff_for_upload(&f.local, &f.remote, &BTreeSet::new());
    assert!(!first.is_empty());

    // After the first upload the remote manifest equals the local one.
    let second = diff_for_upload(&f.local, &f.local, &BTreeSet::new());
    assert!(second.is_empty());
}

#[test]
fn forced_unchanged_path_is_uploaded() {
    let f = families(3, 0, 0, 0);
    let forced: BTreeSet<String> = ["a/001.dat".to_string()].into_iter().collect();
    let plan = diff_for_upload(&f.local, &f.remote, &forced);
    assert_eq!(plan.to_transfer, forced);
}

#[test]
fn plan_enumeration_is_sorted() {
    let f = families(0, 0, 30, 0);
    let plan = diff_for_upload(&f.local, &f.remote, &BTreeSet::new());
    let listed: Vec<_> = plan.to_transfer.iter().cloned().collect();
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed, sorted);
}
