mod common;

use aam::core::{FrameError, LandmarkManager, PatchShape, Shape, TransformKind};
use aam::{Aam, AamError, AamInstance, Appearance, ErrorKind, Features, GRADIENT, NO_OP};
use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use common::*;

fn synthesizing_variants() -> Vec<(&'static str, Aam)> {
    all_variants()
        .into_iter()
        .filter(|(_, aam)| aam.kind().synthesizes())
        .collect()
}

fn frame_of(aam: &Aam, level: isize, instance: &AamInstance) -> aam::core::ReferenceFrame {
    let source = instance.source().expect("instance carries frame landmarks");
    aam.build_frame(level, source).expect("frame")
}

#[test]
fn every_level_yields_the_frame_extent() {
    for (label, aam) in synthesizing_variants() {
        let n = aam.n_levels() as isize;
        for level in -n..n {
            let inst = aam.instance(None, None, level).expect(label);
            let frame = frame_of(&aam, level, &inst);
            match &inst {
                AamInstance::Image(img) => {
                    assert_eq!(img.mask, frame.mask, "{label} level {level}");
                    assert_eq!(img.landmarks, frame.landmarks, "{label} level {level}");
                }
                AamInstance::Parts(parts) => {
                    assert_eq!(parts.n_parts, 4, "{label}");
                    assert_eq!(parts.landmarks, frame.landmarks, "{label} level {level}");
                }
            }

            let mut rng = ChaCha8Rng::seed_from_u64((level + 10) as u64);
            let inst = aam
                .random_instance_with_rng(level, &mut rng)
                .expect(label);
            let frame = frame_of(&aam, level, &inst);
            if let AamInstance::Image(img) = &inst {
                assert_eq!(img.mask, frame.mask, "{label} random level {level}");
            }
            assert_eq!(
                inst.source().unwrap().n_points(),
                frame.source().unwrap().n_points()
            );
        }
    }
}

#[test]
fn unseeded_random_instance_works() {
    let aam = global_aam(&square_mesh(), TransformKind::ThinPlateSplines);
    let inst = aam.random_instance(0).expect("random instance");
    assert!(inst.as_image().is_some());
}

#[test]
fn levels_out_of_range_are_rejected() {
    let aam = global_aam(&square_mesh(), TransformKind::ThinPlateSplines);
    for level in [2, 3, -3, isize::MIN] {
        let err = aam.instance(None, None, level).unwrap_err();
        assert!(
            matches!(err, AamError::LevelOutOfRange { n_levels: 2, .. }),
            "level {level}: {err}"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(aam.random_instance(level).is_err());
    }
}

#[test]
fn omitted_weights_are_a_single_zero() {
    let aam = global_aam(&square_mesh(), TransformKind::ThinPlateSplines);
    assert_eq!(aam.scaled_shape_weights(None, 0).unwrap(), vec![0.0]);
    assert_eq!(aam.scaled_appearance_weights(None, -1).unwrap(), vec![0.0]);

    for level in [0, 1, -1] {
        let omitted = aam.instance(None, None, level).unwrap();
        let zero = aam.instance(Some(&[0.0]), Some(&[0.0]), level).unwrap();
        assert_eq!(omitted, zero);
    }
}

#[test]
fn weights_are_scaled_by_root_eigenvalues() {
    let aam = global_aam(&square_mesh(), TransformKind::ThinPlateSplines);
    let sw = aam.scaled_shape_weights(Some(&[1.0, 2.0]), 0).unwrap();
    assert_relative_eq!(sw[0], 2.0);
    assert_relative_eq!(sw[1], 2.0);
    let aw = aam.scaled_appearance_weights(Some(&[-1.0]), 0).unwrap();
    assert_relative_eq!(aw[0], -3.0);

    let err = aam
        .instance(Some(&[1.0, 1.0, 1.0]), None, 0)
        .unwrap_err();
    assert!(matches!(
        err,
        AamError::TooManyWeights {
            given: 3,
            available: 2
        }
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(aam.instance(None, Some(&[0.0; 3]), 1).is_err());
}

#[test]
fn two_level_scenario() {
    let aam = global_aam(&square_mesh(), TransformKind::ThinPlateSplines);
    assert_eq!(aam.n_levels(), 2);

    // last level eigenvalues are [1, 0.25]
    let sw = aam.scaled_shape_weights(Some(&[1.0]), -1).unwrap();
    assert_eq!(sw.len(), 1);
    assert_relative_eq!(sw[0], 1.0);

    // a pure translation leaves the placed frame unchanged, and the
    // appearance defaults to its mean
    let inst = aam.instance(Some(&[1.0]), None, -1).unwrap();
    let img = inst.as_image().expect("dense instance");
    let mean = aam.instance(None, None, -1).unwrap();
    assert_images_close(img, mean.as_image().unwrap(), 1e-6);
    for (x, y) in img.mask.true_pixels() {
        let inside = (4..=12).contains(&x) && (4..=12).contains(&y);
        if inside {
            assert_relative_eq!(img.image.pixel(x, y)[0], MEAN_INTENSITY, epsilon = 1e-6);
        }
    }
}

#[test]
fn mean_instance_reproduces_the_mean_appearance() {
    for transform in TransformKind::ALL {
        let aam = global_aam(&square_mesh(), transform);
        let inst = aam.instance(None, None, 0).unwrap();
        let img = inst.as_image().unwrap();
        let Appearance::Dense(template) = aam.appearance_models()[0].mean() else {
            panic!("dense template expected");
        };
        assert_eq!(img.mask, template.mask);
        // interior pixels: far from the zero-valued outside of the mask
        assert_relative_eq!(img.image.pixel(8, 8)[0], MEAN_INTENSITY, epsilon = 1e-6);
        assert_relative_eq!(img.image.pixel(10, 5)[0], MEAN_INTENSITY, epsilon = 1e-6);
    }
}

#[test]
fn appearance_weights_change_intensity() {
    let aam = global_aam(&square_mesh(), TransformKind::PiecewiseAffine);
    let Appearance::Dense(template) = aam.appearance_models()[0].mean() else {
        panic!("dense template expected");
    };
    let n = template.mask.n_true() as f64;
    let inst = aam.instance(None, Some(&[1.0]), 0).unwrap();
    let img = inst.as_image().unwrap();
    // weight 1 * sqrt(9) along a unit component spread over n pixels
    assert_relative_eq!(
        img.image.pixel(8, 8)[0],
        MEAN_INTENSITY + 3.0 / n.sqrt(),
        epsilon = 1e-6
    );
}

#[test]
fn shape_weights_resize_the_frame() {
    let aam = global_aam(&square_cloud(), TransformKind::ThinPlateSplines);
    let mean = aam.instance(None, None, 0).unwrap();
    assert_eq!(mean.dimensions(), (17, 17));

    // right edge moves by 1 * sqrt(1) / sqrt(2) ~ 0.71 px
    let wide = aam.instance(Some(&[0.0, 1.0]), None, 0).unwrap();
    assert_eq!(wide.dimensions(), (18, 17));
    let src = wide.source().unwrap();
    assert_relative_eq!(
        src.points()[1].x - src.points()[0].x,
        10.0 + 0.5f64.sqrt(),
        epsilon = 1e-9
    );
}

#[test]
fn global_frame_follows_the_triangulation() {
    let mesh = global_aam(&square_mesh(), TransformKind::ThinPlateSplines);
    let inst = mesh.instance(None, None, 0).unwrap();
    let img = inst.as_image().unwrap();
    assert!(inst.source().unwrap().is_tri_mesh());
    assert_eq!(img.mask.n_true(), 11 * 11);
    assert!(!img.mask.get(0, 0));

    let cloud = global_aam(&square_cloud(), TransformKind::ThinPlateSplines);
    let inst = cloud.instance(None, None, 0).unwrap();
    let img = inst.as_image().unwrap();
    assert!(!inst.source().unwrap().is_tri_mesh());
    assert_eq!(img.mask.n_true(), img.width() * img.height());
}

#[test]
fn global_frame_uses_instance_triangulation_when_template_has_none() {
    let aam = global_aam(&square_cloud(), TransformKind::ThinPlateSplines);
    let frame = aam.build_frame(0, &square_mesh()).unwrap();
    assert!(frame.source().unwrap().is_tri_mesh());
    assert_eq!(frame.mask.n_true(), 11 * 11);

    let frame = aam.build_frame(0, &square_cloud()).unwrap();
    assert!(!frame.source().unwrap().is_tri_mesh());
}

#[test]
fn global_frame_keeps_template_triangulation_for_a_point_cloud_instance() {
    let aam = global_aam(&square_mesh(), TransformKind::ThinPlateSplines);
    let frame = aam.build_frame(0, &square_cloud()).unwrap();
    assert!(frame.source().unwrap().is_tri_mesh());
    assert_eq!(frame.mask.n_true(), 11 * 11);
    assert!(!frame.mask.get(0, 0));
}

#[test]
fn extreme_weights_are_rejected_before_allocating_a_frame() {
    let aam = global_aam(&square_cloud(), TransformKind::ThinPlateSplines);
    let err = aam.instance(Some(&[0.0, 1e300]), None, 0).unwrap_err();
    assert!(
        matches!(err, AamError::Frame(FrameError::TooLarge { .. })),
        "{err}"
    );
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let patch = patch_aam(PatchShape::new(3, 3));
    let err = patch.instance(Some(&[0.0, 1e300]), None, -1).unwrap_err();
    assert!(matches!(err, AamError::Frame(FrameError::TooLarge { .. })));
}

#[test]
fn patch_frames_ignore_triangulation() {
    for aam in [patch_aam(PatchShape::new(3, 3)), parts_aam(PatchShape::new(5, 3))] {
        let from_mesh = aam.build_frame(0, &square_mesh()).unwrap();
        let from_cloud = aam.build_frame(0, &square_cloud()).unwrap();
        assert_eq!(from_mesh, from_cloud, "{}", aam.kind().name());
        assert!(!from_mesh.source().unwrap().is_tri_mesh());
    }
}

#[test]
fn patch_instance_masks_only_patches() {
    let aam = patch_aam(PatchShape::new(3, 3));
    let inst = aam.instance(None, None, 0).unwrap();
    let img = inst.as_image().unwrap();
    assert_eq!((img.width(), img.height()), (15, 15));
    assert_eq!(img.mask.n_true(), 4 * 9);
    // centre of the first patch sits on the first landmark
    assert_relative_eq!(img.image.pixel(2, 2)[0], MEAN_INTENSITY, epsilon = 1e-6);
}

#[test]
fn parts_instance_is_not_warped() {
    let ps = PatchShape::new(5, 3);
    let aam = parts_aam(ps);
    let inst = aam.instance(None, Some(&[1.0]), 1).unwrap();
    let parts = inst.as_parts().expect("parts instance");
    assert_eq!(parts.patch_shape, ps);
    assert_eq!(inst.dimensions(), (3, 5));
    let n = (4 * ps.n_pixels()) as f64;
    for v in &parts.patches {
        assert_relative_eq!(*v, MEAN_INTENSITY + 1.0 / n.sqrt(), epsilon = 1e-9);
    }
    assert_eq!(parts.landmarks.source().unwrap().n_points(), 4);
}

#[test]
fn linear_variants_do_not_synthesize() {
    for aam in [linear_global_aam(), linear_patch_aam(PatchShape::new(3, 3))] {
        let err = aam.instance(None, None, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation, "{err}");
        let err = aam.random_instance(-1).unwrap_err();
        assert!(matches!(
            err,
            AamError::UnsupportedOperation {
                operation: "random_instance",
                ..
            }
        ));
        assert!(aam.build_frame(0, &square_mesh()).is_err());
        // weights and features still work
        assert_eq!(aam.scaled_shape_weights(Some(&[1.0]), 0).unwrap(), vec![2.0]);
        assert_eq!(aam.kind().n_landmarks(), Some(4));
    }
}

#[test]
fn landmark_count_mismatch_is_a_geometry_error() {
    let mut components = global_components(&square_mesh());
    for am in &mut components.appearance_models {
        let Appearance::Dense(template) = am.mean() else {
            unreachable!()
        };
        let mut template = template.clone();
        let three = Shape::point_cloud(square_mesh().points()[..3].to_vec());
        template.landmarks = LandmarkManager::with_source(three);
        *am = aam::core::PcaModel::new(
            Appearance::Dense(template),
            nalgebra::DMatrix::zeros(0, am.n_features()),
            vec![],
        )
        .unwrap();
    }
    let aam = Aam::global(components, TransformKind::ThinPlateSplines).unwrap();
    let err = aam.instance(None, Some(&[]), 0).unwrap_err();
    assert!(matches!(err, AamError::GeometryMismatch(_)), "{err}");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn inconsistent_components_are_rejected() {
    let mut c = global_components(&square_mesh());
    c.scales.pop();
    assert!(matches!(
        Aam::global(c, TransformKind::ThinPlateSplines),
        Err(AamError::InconsistentModel(_))
    ));

    let mut c = global_components(&square_mesh());
    c.features = Features::PerLevel(vec![NO_OP]);
    assert!(Aam::global(c, TransformKind::ThinPlateSplines).is_err());

    // a dense appearance cannot back the parts variant
    let c = global_components(&square_mesh());
    let err = Aam::parts(c, PatchShape::new(3, 3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let c = parts_components(&square_mesh(), PatchShape::new(3, 3));
    assert!(Aam::global(c, TransformKind::ThinPlateSplines).is_err());

    let c = patch_components(&square_mesh(), PatchShape::new(3, 3));
    assert!(Aam::patch(c, PatchShape::new(0, 3)).is_err());
}

#[test]
fn level_features_apply_per_level() {
    let mut c = global_components(&square_mesh());
    c.features = Features::PerLevel(vec![NO_OP, GRADIENT]);
    let aam = Aam::global(c, TransformKind::ThinPlateSplines).unwrap();
    assert!(!aam.scale_features());

    let inst = aam.instance(None, None, 0).unwrap();
    let img = inst.as_image().unwrap();
    assert_eq!(aam.level_features(img, 0).unwrap().n_channels(), 1);
    let grad = aam.level_features(img, -1).unwrap();
    assert_eq!(grad.n_channels(), 2);
    assert_eq!(grad.mask, img.mask);
    assert!(aam.level_features(img, 2).is_err());
}
