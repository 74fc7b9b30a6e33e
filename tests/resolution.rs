// tests/resolution.rs

//! End-to-end resolution tests through the full pipeline.

mod common;

use common::{manifest, memory_source, recipe};
use kiln::{Error, ErrorKind, Resolver, ResolverConfig, Settings};
use std::time::Duration;

fn resolver(texts: &[String]) -> Resolver<kiln::MemorySource> {
    Resolver::new(memory_source(texts), ResolverConfig::default())
}

const FLAG: &str = "[options]\nflag = [true, false]\n[default_options]\nflag = false\n";

#[tokio::test]
async fn test_diamond_collapses_to_one_node() {
    let resolver = resolver(&[
        recipe("a", "1.0", &["c/1.0"], ""),
        recipe("b", "1.0", &["c/1.0"], ""),
        recipe("c", "1.0", &[], ""),
    ]);
    let root = manifest(&recipe("r", "1.0", &["a/1.0", "b/1.0"], ""));

    let plan = resolver.resolve(root, &Settings::new()).await.unwrap();

    let names: Vec<&str> = plan.packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b", "r"]);
    assert_eq!(plan.package("r").unwrap().requires, vec!["a/1.0", "b/1.0"]);
}

#[tokio::test]
async fn test_version_conflict_names_both_chains() {
    let resolver = resolver(&[
        recipe("a", "1.0", &[], ""),
        recipe("a", "2.0", &[], ""),
        recipe("b", "1.0", &["a/2.0"], ""),
    ]);
    let root = manifest(&recipe("r", "1.0", &["a/1.0", "b/1.0"], ""));

    let err = resolver.resolve(root, &Settings::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    match err {
        Error::VersionConflict { package, requests } => {
            assert_eq!(package, "a");
            let lines: Vec<String> = requests.iter().map(ToString::to_string).collect();
            assert!(lines.contains(&"r/1.0 requires a/1.0".to_string()));
            assert!(lines.contains(&"r/1.0 -> b/1.0 requires a/2.0".to_string()));
        }
        other => panic!("expected version conflict, got {other}"),
    }
}

#[tokio::test]
async fn test_root_pin_settles_transitive_conflict() {
    let resolver = resolver(&[
        recipe("a", "1.0", &[], ""),
        recipe("a", "2.0", &[], ""),
        recipe("b", "1.0", &["a/2.0"], ""),
    ]);
    let root = manifest(&recipe("r", "1.0", &["a/1.0", "b/1.0"], "pins = [\"a/1.0\"]\n"));

    let plan = resolver.resolve(root, &Settings::new()).await.unwrap();
    assert_eq!(plan.package("a").unwrap().version, "1.0");
    assert_eq!(plan.package("b").unwrap().requires, vec!["a/1.0"]);
}

#[tokio::test]
async fn test_range_resolves_to_highest_match() {
    let resolver = resolver(&[
        recipe("zlib", "1.2.11", &[], ""),
        recipe("zlib", "1.2.13", &[], ""),
        recipe("zlib", "2.0.0", &[], ""),
    ]);
    let root = manifest(&recipe("r", "1.0", &["zlib/[>=1.2 <2]"], ""));

    let plan = resolver.resolve(root, &Settings::new()).await.unwrap();
    assert_eq!(plan.package("zlib").unwrap().version, "1.2.13");
}

#[tokio::test]
async fn test_root_option_beats_intermediate() {
    let resolver = resolver(&[
        recipe("a", "1.0", &["c/1.0"], "[default_options]\n\"c:flag\" = false\n"),
        recipe("c", "1.0", &[], FLAG),
    ]);
    let root = manifest(&recipe(
        "r",
        "1.0",
        &["a/1.0"],
        "[default_options]\n\"c:flag\" = true\n",
    ));

    let plan = resolver.resolve(root, &Settings::new()).await.unwrap();
    assert_eq!(plan.package("c").unwrap().options["flag"], "true");
}

#[tokio::test]
async fn test_equal_depth_option_disagreement() {
    let resolver = resolver(&[
        recipe("a", "1.0", &["c/1.0"], "[default_options]\n\"c:flag\" = true\n"),
        recipe("b", "1.0", &["c/1.0"], "[default_options]\n\"c:flag\" = false\n"),
        recipe("c", "1.0", &[], FLAG),
    ]);
    let root = manifest(&recipe("r", "1.0", &["a/1.0", "b/1.0"], ""));

    let err = resolver.resolve(root, &Settings::new()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::OptionConflict { ref package, ref option, .. } if package == "c" && option == "flag"
    ));
}

#[tokio::test]
async fn test_cycle_is_rejected() {
    let resolver = resolver(&[
        recipe("a", "1.0", &["b/1.0"], ""),
        recipe("b", "1.0", &["a/1.0"], ""),
    ]);
    let root = manifest(&recipe("r", "1.0", &["a/1.0"], ""));

    let err = resolver.resolve(root, &Settings::new()).await.unwrap_err();
    match err {
        Error::CyclicDependency { cycle } => {
            let names: Vec<&str> = cycle.iter().map(|id| id.name.as_str()).collect();
            assert!(names.contains(&"a"));
            assert!(names.contains(&"b"));
        }
        other => panic!("expected cycle, got {other}"),
    }
}

#[tokio::test]
async fn test_unrecognized_setting_override() {
    let resolver = resolver(&[recipe(
        "a",
        "1.0",
        &[],
        "settings = [\"os\"]\n[setting_overrides]\nbuild_type = \"Debug\"\n",
    )]);
    let root = manifest(&recipe("r", "1.0", &["a/1.0"], ""));

    let err = resolver.resolve(root, &Settings::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(matches!(
        err,
        Error::UnrecognizedSetting { ref package, ref setting } if package.name == "a" && setting == "build_type"
    ));
}

#[tokio::test]
async fn test_settings_reach_every_package() {
    let resolver = resolver(&[
        recipe(
            "a",
            "1.0",
            &["b/1.0"],
            "settings = [\"os\", \"build_type\"]\n[setting_overrides]\nbuild_type = \"Debug\"\n",
        ),
        recipe("b", "1.0", &[], ""),
    ]);
    let root = manifest(&recipe("r", "1.0", &["a/1.0"], ""));
    let settings = Settings::from_pairs(["os=Linux", "build_type=Release"]).unwrap();

    let plan = resolver.resolve(root, &settings).await.unwrap();
    assert_eq!(plan.package("a").unwrap().settings["build_type"], "Debug");
    assert_eq!(plan.package("b").unwrap().settings["build_type"], "Release");
    assert_eq!(plan.package("b").unwrap().settings["os"], "Linux");
    assert_ne!(
        plan.package("a").unwrap().package_id,
        plan.package("b").unwrap().package_id
    );
}

#[tokio::test]
async fn test_shared_dependency_fetched_once() {
    let source = memory_source(&[
        recipe("a", "1.0", &["d/1.0"], ""),
        recipe("b", "1.0", &["d/1.0"], ""),
        recipe("d", "1.0", &[], ""),
    ])
    .with_latency(Duration::from_millis(20));
    let resolver = Resolver::new(source, ResolverConfig::default());
    let root = manifest(&recipe("r", "1.0", &["a/1.0", "b/1.0"], ""));

    resolver.resolve(root, &Settings::new()).await.unwrap();
    assert_eq!(resolver.source().inner().fetch_count("d", "1.0"), 1);
}

#[tokio::test]
async fn test_missing_recipe_aborts() {
    let resolver = resolver(&[]);
    let root = manifest(&recipe("r", "1.0", &["ghost/1.0"], ""));

    let err = resolver.resolve(root, &Settings::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_identical_runs_are_byte_identical() {
    let texts = [
        recipe("a", "1.0", &["c/1.0"], ""),
        recipe("b", "1.0", &["c/1.0"], ""),
        recipe("c", "1.0", &[], FLAG),
    ];
    let root = recipe(
        "r",
        "1.0",
        &["b/1.0", "a/1.0"],
        "generators = [\"json\"]\n[default_options]\n\"c:flag\" = true\n",
    );
    let settings = Settings::from_pairs(["os=Linux", "arch=x86_64"]).unwrap();

    let first = resolver(&texts)
        .resolve(manifest(&root), &settings)
        .await
        .unwrap();
    let second = resolver(&texts)
        .resolve(manifest(&root), &settings)
        .await
        .unwrap();

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.plan_hash().unwrap(), second.plan_hash().unwrap());
    for generator in first.output_generators() {
        assert_eq!(
            first.render(&generator).unwrap(),
            second.render(&generator).unwrap()
        );
    }
}
