#![allow(dead_code)]

use aam::core::{
    build_patch_reference_frame, build_reference_frame, LandmarkManager, MaskedImage, PartsImage,
    PatchShape, PcaModel, Point2, ReferenceFrame, Shape, TransformKind, DEFAULT_BOUNDARY,
};
use aam::{Aam, AamComponents, Appearance, Features, NO_OP};
use nalgebra::DMatrix;

pub const SCALES: [f64; 2] = [0.5, 1.0];
pub const SHAPE_EIGENVALUES: [[f64; 2]; 2] = [[4.0, 1.0], [1.0, 0.25]];
pub const APPEARANCE_EIGENVALUES: [[f64; 2]; 2] = [[9.0, 4.0], [1.0, 1.0]];
pub const MEAN_INTENSITY: f64 = 100.0;
pub const SQUARE_TRILIST: [[usize; 3]; 2] = [[0, 1, 2], [0, 2, 3]];

pub fn square_points() -> Vec<Point2<f64>> {
    vec![
        Point2::new(0.0, 0.0),
        Point2::new(10.0, 0.0),
        Point2::new(10.0, 10.0),
        Point2::new(0.0, 10.0),
    ]
}

pub fn square_mesh() -> Shape {
    Shape::tri_mesh(square_points(), SQUARE_TRILIST.to_vec()).expect("valid mesh")
}

pub fn square_cloud() -> Shape {
    Shape::point_cloud(square_points())
}

/// Component 0 translates along x, component 1 widens the right edge.
pub fn shape_model(template: &Shape, level: usize) -> PcaModel<Shape> {
    let h = 0.5;
    let r = std::f64::consts::FRAC_1_SQRT_2;
    let components = DMatrix::from_row_slice(
        2,
        8,
        &[
            h, 0.0, h, 0.0, h, 0.0, h, 0.0, //
            0.0, 0.0, r, 0.0, r, 0.0, 0.0, 0.0,
        ],
    );
    PcaModel::new(
        template.clone(),
        components,
        SHAPE_EIGENVALUES[level].to_vec(),
    )
    .expect("valid shape model")
}

/// Component 0 brightens every parameter uniformly, component 1 only the
/// first one.
fn appearance_model(template: Appearance, level: usize) -> PcaModel<Appearance> {
    use aam::core::Vectorizable;

    let n = template.n_parameters();
    let mut components = DMatrix::zeros(2, n);
    let u = 1.0 / (n as f64).sqrt();
    for j in 0..n {
        components[(0, j)] = u;
    }
    components[(1, 0)] = 1.0;
    PcaModel::new(template, components, APPEARANCE_EIGENVALUES[level].to_vec())
        .expect("valid appearance model")
}

pub fn dense_template(frame: &ReferenceFrame) -> MaskedImage {
    let mut img = frame.blank_image(1);
    img.fill_masked(MEAN_INTENSITY);
    img
}

pub fn dense_appearance_model(frame: &ReferenceFrame, level: usize) -> PcaModel<Appearance> {
    appearance_model(Appearance::Dense(dense_template(frame)), level)
}

pub fn parts_template(shape: &Shape, parts_shape: PatchShape) -> PartsImage {
    let mut parts = PartsImage::zeros(shape.n_points(), parts_shape, 1);
    parts.patches.fill(MEAN_INTENSITY);
    parts.landmarks = LandmarkManager::with_source(shape.to_point_cloud());
    parts
}

pub fn components(
    reference: &Shape,
    features: Features,
    appearance: impl Fn(usize) -> PcaModel<Appearance>,
) -> AamComponents {
    AamComponents {
        shape_models: (0..SCALES.len()).map(|l| shape_model(reference, l)).collect(),
        appearance_models: (0..SCALES.len()).map(appearance).collect(),
        reference_shape: reference.clone(),
        features,
        sigma: None,
        scales: SCALES.to_vec(),
        scale_shapes: true,
    }
}

pub fn global_components(reference: &Shape) -> AamComponents {
    let frame = build_reference_frame(reference, reference.trilist(), DEFAULT_BOUNDARY)
        .expect("frame");
    components(reference, Features::Shared(NO_OP), |l| {
        dense_appearance_model(&frame, l)
    })
}

pub fn patch_components(reference: &Shape, patch_shape: PatchShape) -> AamComponents {
    let frame = build_patch_reference_frame(reference, patch_shape).expect("patch frame");
    components(reference, Features::PerLevel(vec![NO_OP, NO_OP]), |l| {
        dense_appearance_model(&frame, l)
    })
}

pub fn parts_components(reference: &Shape, parts_shape: PatchShape) -> AamComponents {
    let template = parts_template(reference, parts_shape);
    components(reference, Features::Shared(NO_OP), |l| {
        appearance_model(Appearance::Parts(template.clone()), l)
    })
}

pub fn global_aam(reference: &Shape, transform: TransformKind) -> Aam {
    Aam::global(global_components(reference), transform).expect("global aam")
}

pub fn patch_aam(patch_shape: PatchShape) -> Aam {
    Aam::patch(patch_components(&square_mesh(), patch_shape), patch_shape).expect("patch aam")
}

pub fn parts_aam(parts_shape: PatchShape) -> Aam {
    Aam::parts(parts_components(&square_mesh(), parts_shape), parts_shape).expect("parts aam")
}

pub fn linear_global_aam() -> Aam {
    Aam::linear_global(
        global_components(&square_mesh()),
        TransformKind::ThinPlateSplines,
        4,
    )
    .expect("linear global aam")
}

pub fn linear_patch_aam(patch_shape: PatchShape) -> Aam {
    Aam::linear_patch(
        patch_components(&square_mesh(), patch_shape),
        patch_shape,
        4,
    )
    .expect("linear patch aam")
}

/// Every variant, with a label for assertion messages.
pub fn all_variants() -> Vec<(&'static str, Aam)> {
    let ps = PatchShape::new(3, 3);
    vec![
        ("global/tps", global_aam(&square_mesh(), TransformKind::ThinPlateSplines)),
        ("global/pwa", global_aam(&square_mesh(), TransformKind::PiecewiseAffine)),
        ("global/cloud", global_aam(&square_cloud(), TransformKind::ThinPlateSplines)),
        ("patch", patch_aam(ps)),
        ("parts", parts_aam(ps)),
        ("linear_global", linear_global_aam()),
        ("linear_patch", linear_patch_aam(ps)),
    ]
}

pub fn assert_images_close(a: &MaskedImage, b: &MaskedImage, tol: f64) {
    assert_eq!(a.mask, b.mask, "masks differ");
    assert_eq!(a.n_channels(), b.n_channels());
    for (x, y) in a.mask.true_pixels() {
        for (va, vb) in a.image.pixel(x, y).iter().zip(b.image.pixel(x, y)) {
            assert!(
                (va - vb).abs() <= tol,
                "pixel ({x}, {y}): {va} vs {vb} (tol {tol})"
            );
        }
    }
}
