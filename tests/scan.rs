//! End-to-end scans over synthesized artifacts.

mod common;

use std::fs::File;

use classmap::vfs::stream::StreamResolver;
use classmap::{
    ClassMap, ClassmapError, Config, NameFilter, ResourcesScanner, SubTypesScanner,
    TypeTagsScanner, Vfs,
};
use common::{class_bytes, class_path, write_archive, write_classes};

fn init_logs() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn hierarchy_classes() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        (
            "com.app.Base",
            class_bytes("com.app.Base", "java.lang.Object", &[], &[]),
        ),
        (
            "com.app.Service",
            class_bytes(
                "com.app.Service",
                "com.app.Base",
                &["com.app.Api"],
                &["com.app.Component"],
            ),
        ),
        (
            "com.app.Special",
            class_bytes("com.app.Special", "com.app.Service", &[], &[]),
        ),
    ]
}

#[test]
fn scans_directory_hierarchy() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    write_classes(dir.path(), &hierarchy_classes());
    let map = ClassMap::scan_locators([dir.path().to_path_buf()]).unwrap();

    let mut subs = map.all_sub_types_of("com.app.Base").unwrap();
    subs.sort();
    assert_eq!(subs, vec!["com.app.Service", "com.app.Special"]);
    assert_eq!(
        map.sub_types_of("com.app.Api").unwrap(),
        vec!["com.app.Service"]
    );
    let mut tagged = map.types_tagged_with("com.app.Component").unwrap();
    tagged.sort();
    // Tagging is inherited through the subtype closure.
    assert_eq!(tagged, vec!["com.app.Service", "com.app.Special"]);
}

#[test]
fn sequential_and_parallel_scans_agree() {
    let dir_a = tempfile::tempdir().unwrap();
    write_classes(dir_a.path(), &hierarchy_classes());
    let dir_b = tempfile::tempdir().unwrap();
    write_classes(
        dir_b.path(),
        &[(
            "com.other.Extra",
            class_bytes("com.other.Extra", "com.app.Base", &[], &[]),
        )],
    );
    let locators = [dir_a.path().to_path_buf(), dir_b.path().to_path_buf()];

    let sequential = ClassMap::new(Config::new().locators(locators.clone()).sequential()).unwrap();
    let parallel = ClassMap::new(Config::new().locators(locators).parallel(4)).unwrap();
    // Interleaving may reorder values under a key, so compare as sets.
    let normalized = |map: &ClassMap| {
        let mut snapshot = map.store().snapshot();
        for table in snapshot.values_mut() {
            for values in table.values_mut() {
                values.sort();
            }
        }
        snapshot
    };
    assert_eq!(normalized(&sequential), normalized(&parallel));
}

#[test]
fn scans_jar_archive() {
    let jar = tempfile::Builder::new().suffix(".jar").tempfile().unwrap();
    let entries: Vec<(String, Vec<u8>)> = hierarchy_classes()
        .into_iter()
        .map(|(name, bytes)| (class_path(name), bytes))
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    write_archive(jar.reopen().unwrap(), &borrowed);

    let map = ClassMap::scan_locators([jar.path().to_path_buf()]).unwrap();
    let mut subs = map.all_sub_types_of("com.app.Base").unwrap();
    subs.sort();
    assert_eq!(subs, vec!["com.app.Service", "com.app.Special"]);
}

#[test]
fn scans_nested_jar_locator() {
    let mut inner = Vec::new();
    write_archive(
        std::io::Cursor::new(&mut inner),
        &[(
            class_path("com.app.Service").as_str(),
            class_bytes("com.app.Service", "com.app.Base", &[], &[]).as_slice(),
        )],
    );
    let outer = tempfile::Builder::new().suffix(".jar").tempfile().unwrap();
    write_archive(
        outer.reopen().unwrap(),
        &[("BOOT-INF/lib/core.jar", inner.as_slice())],
    );

    let locator = format!("{}!/BOOT-INF/lib/core.jar", outer.path().to_string_lossy());
    let map = ClassMap::new(
        Config::new()
            .add_locator(locator.as_str())
            .expand_super_types(false),
    )
    .unwrap();
    assert_eq!(
        map.sub_types_of("com.app.Base").unwrap(),
        vec!["com.app.Service"]
    );
}

#[test]
fn scans_through_stream_resolver() {
    let jar = tempfile::Builder::new().suffix(".jar").tempfile().unwrap();
    let entries: Vec<(String, Vec<u8>)> = hierarchy_classes()
        .into_iter()
        .map(|(name, bytes)| (class_path(name), bytes))
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    write_archive(jar.reopen().unwrap(), &borrowed);

    let map = ClassMap::new(
        Config::new()
            .add_locator(jar.path().to_path_buf())
            .vfs(Vfs::with_resolvers(vec![Box::new(StreamResolver)]))
            .expand_super_types(false),
    )
    .unwrap();
    let mut subs = map.all_sub_types_of("com.app.Base").unwrap();
    subs.sort();
    assert_eq!(subs, vec!["com.app.Service", "com.app.Special"]);
}

#[test]
fn expansion_repairs_unscanned_ancestors() {
    // Only Special is scanned; Service and Base are visible to the
    // resolver through the resolution context but excluded from the scan.
    let dir = tempfile::tempdir().unwrap();
    write_classes(dir.path(), &hierarchy_classes());
    let map = ClassMap::new(
        Config::new()
            .add_locator(dir.path().to_path_buf())
            .filter_inputs(NameFilter::new().include(r".*Special.*").unwrap()),
    )
    .unwrap();

    // The scan alone recorded only Service -> Special; expansion stitched
    // Base -> Service back in from the resolution context.
    let mut subs = map.all_sub_types_of("com.app.Base").unwrap();
    subs.sort();
    assert_eq!(subs, vec!["com.app.Service", "com.app.Special"]);
    let mut including = map
        .store()
        .get_all_including("SubTypes", ["com.app.Base"])
        .unwrap();
    including.sort();
    assert_eq!(
        including,
        vec!["com.app.Base", "com.app.Service", "com.app.Special"]
    );
}

#[test]
fn input_filter_excludes_whole_files() {
    let dir = tempfile::tempdir().unwrap();
    write_classes(
        dir.path(),
        &[
            ("foo.Bar", class_bytes("foo.Bar", "foo.Sup", &[], &[])),
            ("bar.Foo", class_bytes("bar.Foo", "bar.Sup", &[], &[])),
        ],
    );
    let map = ClassMap::new(
        Config::new()
            .add_locator(dir.path().to_path_buf())
            .filter_inputs(NameFilter::new().exclude(r"foo\..*").unwrap())
            .expand_super_types(false),
    )
    .unwrap();
    assert_eq!(map.store().keys("SubTypes").unwrap(), vec!["bar.Sup"]);
}

#[test]
fn rescanning_same_locator_stays_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    write_classes(dir.path(), &hierarchy_classes());
    let map = ClassMap::new(
        Config::new()
            .locators([dir.path().to_path_buf(), dir.path().to_path_buf()])
            .expand_super_types(false),
    )
    .unwrap();
    assert_eq!(
        map.sub_types_of("com.app.Api").unwrap(),
        vec!["com.app.Service"]
    );
}

#[test]
fn resources_are_indexed_by_name() {
    let dir = tempfile::tempdir().unwrap();
    write_classes(dir.path(), &hierarchy_classes());
    std::fs::create_dir_all(dir.path().join("META-INF")).unwrap();
    std::fs::write(dir.path().join("META-INF/app.properties"), b"k=v").unwrap();
    let map = ClassMap::new(
        Config::new()
            .add_locator(dir.path().to_path_buf())
            .add_scanner(Box::new(ResourcesScanner::new())),
    )
    .unwrap();
    assert_eq!(
        map.resources(&regex::Regex::new(r".*\.properties").unwrap())
            .unwrap(),
        vec!["META-INF/app.properties"]
    );
}

#[test]
fn querying_unconfigured_index_fails_by_name() {
    let dir = tempfile::tempdir().unwrap();
    write_classes(dir.path(), &hierarchy_classes());
    let map = ClassMap::scan_locators([dir.path().to_path_buf()]).unwrap();
    let err = map
        .resources(&regex::Regex::new(".*").unwrap())
        .unwrap_err();
    match err {
        ClassmapError::Configuration { index } => assert_eq!(index, "Resources"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn save_collect_and_merge_round_trip() {
    let dir_a = tempfile::tempdir().unwrap();
    write_classes(dir_a.path(), &hierarchy_classes());
    let dir_b = tempfile::tempdir().unwrap();
    write_classes(
        dir_b.path(),
        &[(
            "com.other.Extra",
            class_bytes("com.other.Extra", "com.app.Base", &[], &[]),
        )],
    );

    let map_a = ClassMap::scan_locators([dir_a.path().to_path_buf()]).unwrap();
    let map_b = ClassMap::scan_locators([dir_b.path().to_path_buf()]).unwrap();

    let snapshot = tempfile::NamedTempFile::new().unwrap();
    map_a.save(File::create(snapshot.path()).unwrap()).unwrap();

    let merged = ClassMap::collect_file(snapshot.path()).unwrap();
    merged.merge(&map_b);
    let mut subs = merged.all_sub_types_of("com.app.Base").unwrap();
    subs.sort();
    assert_eq!(
        subs,
        vec!["com.app.Service", "com.app.Special", "com.other.Extra"]
    );

    // Merging the same snapshot again changes nothing observable.
    merged.collect_into(snapshot.path()).unwrap();
    let mut again = merged.all_sub_types_of("com.app.Base").unwrap();
    again.sort();
    assert_eq!(again, subs);
}

#[test]
fn all_types_requires_object_edges() {
    let dir = tempfile::tempdir().unwrap();
    write_classes(dir.path(), &hierarchy_classes());
    let map = ClassMap::new(
        Config::new()
            .add_locator(dir.path().to_path_buf())
            .add_scanner(Box::new(SubTypesScanner::including_object()))
            .add_scanner(Box::new(TypeTagsScanner::new()))
            .expand_super_types(false),
    )
    .unwrap();
    let mut all = map.all_types().unwrap();
    all.sort();
    assert_eq!(
        all,
        vec!["com.app.Base", "com.app.Service", "com.app.Special"]
    );
}
