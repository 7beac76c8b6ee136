use super::*;
use std::cmp::Ordering;

fn v(input: &str) -> VersionId {
    VersionId::parse(input).expect("must parse version")
}

#[test]
fn newer_patch_release_compares_greater() {
    assert!(v("1.3.0") > v("1.2.0"));
    assert!(v("0.7.10") > v("0.7.9"));
    assert!(v("1.2.0") < v("1.3.0"));
}

#[test]
fn missing_trailing_segments_count_as_zero() {
    assert_eq!(v("1.2"), v("1.2.0"));
    assert_eq!(v("1"), v("1.0.0.0"));
    assert!(v("1.2") < v("1.2.1"));
}

#[test]
fn prerelease_sorts_before_release() {
    assert!(v("1.0.0-beta1") < v("1.0.0"));
    assert!(v("1.0.0~rc.1") < v("1.0.0"));
    assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
    assert!(v("1.0.0-rc.2") < v("1.0.0-rc.10"));
    assert!(v("1.0.0-rc") < v("1.0.0-rc.1"));
    assert!(v("1.0.0-1") < v("1.0.0-alpha"));
}

#[test]
fn build_metadata_is_ignored_for_ordering() {
    assert_eq!(v("1.2.0+kodi21"), v("1.2.0"));
    assert_eq!(v("1.2.0+a").cmp(&v("1.2.0+b")), Ordering::Equal);
    assert_eq!(v("1.2.0+kodi21").as_str(), "1.2.0+kodi21");
}

#[test]
fn epoch_dominates_release() {
    assert!(v("1:0.1.0") > v("9.9.9"));
    assert_eq!(v("0:1.0"), v("1.0"));
}

#[test]
fn text_segments_sort_after_numeric_segments() {
    assert!(v("1.2.a") > v("1.2"));
    assert!(v("1.2.a") > v("1.2.99"));
    assert!(v("1.2.b") > v("1.2.a"));
}

#[test]
fn version_is_never_newer_than_itself() {
    for raw in ["0.7.9", "1.0.0-beta.2", "2:1.0~rc1+build", "1.2.a"] {
        let version = v(raw);
        assert_eq!(version.cmp(&version.clone()), Ordering::Equal);
        assert!(!(version > version.clone()));
    }
}

#[test]
fn ordering_is_total_and_transitive_over_sample() {
    let sample = [
        "0.1", "0.1.0", "0.7.9", "0.7.10", "1.0.0-alpha", "1.0.0-alpha.1", "1.0.0-beta",
        "1.0.0~rc.1", "1.0.0", "1.0.0+b", "1.0.1", "1.0.a", "1:0.0.1",
    ]
    .map(v);

    for a in &sample {
        for b in &sample {
            let forward = a.cmp(b);
            assert_eq!(forward, b.cmp(a).reverse(), "antisymmetry for {a} / {b}");
            for c in &sample {
                if a <= b && b <= c {
                    assert!(a <= c, "transitivity for {a} <= {b} <= {c}");
                }
            }
        }
    }
}

#[test]
fn rejects_malformed_versions() {
    for raw in ["", "  ", "1..2", "1.2/3", "x:1.0", "-beta", "1.0 beta"] {
        assert!(VersionId::parse(raw).is_err(), "must reject '{raw}'");
    }
}

#[test]
fn update_mode_round_trips_through_text() {
    for mode in UpdateMode::ALL {
        assert_eq!(UpdateMode::parse(mode.as_str()), Some(mode));
    }
    assert_eq!(UpdateMode::parse(" Beta "), Some(UpdateMode::Beta));
    assert_eq!(UpdateMode::parse("nightly"), None);
}

#[test]
fn branch_follows_host_major_version() {
    assert_eq!(
        Branch::for_host_major(21),
        Branch::new("develop_kodi21", "matrix")
    );
    assert_eq!(Branch::for_host_major(18), Branch::new("addon_kodi18", "leia"));
}

#[test]
fn major_change_tags_parse() {
    assert_eq!(MajorChange::parse("service"), Some(MajorChange::ServiceLogic));
    assert_eq!(MajorChange::parse("language"), Some(MajorChange::Localization));
    assert_eq!(MajorChange::parse(""), Some(MajorChange::None));
    assert_eq!(MajorChange::parse("other"), None);
    assert!(!MajorChange::None.is_major());
    assert!(MajorChange::ServiceLogic.is_major());
}

#[test]
fn download_error_keeps_status_code() {
    let err = UpdateError::download(TransportError::Status {
        url: "https://example.test/pkg.zip".to_string(),
        status: 404,
    });
    assert_eq!(err.status_code(), Some(404));
    assert!(err.to_string().contains("status 404"));
}

#[test]
fn pipeline_stages_report_increasing_progress() {
    let stages = [
        PipelineStage::Downloading,
        PipelineStage::Unpacking,
        PipelineStage::Installing,
        PipelineStage::CleaningUp,
        PipelineStage::PreparingToStart,
    ];
    for pair in stages.windows(2) {
        assert!(pair[0].percent() < pair[1].percent());
    }
    assert_eq!(PipelineStage::PreparingToStart.percent(), 100);
}
