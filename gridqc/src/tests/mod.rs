mod merge;

use common::grid2::Grid2;

use crate::data::{InputFileDetails, MaskedGrid};

/// 4x5 survey fixture: three masked cells, depths chosen so the reference
/// allowable-uncertainty values apply. 17 valid cells, 5 of which exceed
/// the allowable uncertainty at C=0.1, F=0.007.
pub(crate) struct SurveyFixture {
    pub details: InputFileDetails,
    pub depth: MaskedGrid,
    pub density: MaskedGrid,
    pub uncertainty: MaskedGrid,
}

pub(crate) fn survey_fixture() -> SurveyFixture {
    let mask = vec![
        false, false, false, false, //
        false, false, false, false, //
        false, false, false, false, //
        false, false, false, true, //
        false, false, true, true,
    ];
    let depth = vec![
        -40.0, -40.0, -40.0, -40.0, //
        -40.0, -60.0, -80.0, -40.0, //
        -40.0, -60.0, -70.0, -40.0, //
        -40.0, -30.0, -70.0, -40.0, //
        -40.0, -40.0, -40.0, -40.0,
    ];
    let density = vec![
        10.0, 1.0, 9.0, 9.0, //
        10.0, 2.0, 10.0, 10.0, //
        10.0, 10.0, 10.0, 10.0, //
        10.0, 10.0, 10.0, 10.0, //
        10.0, 10.0, 10.0, 10.0,
    ];
    let uncertainty = vec![
        0.7, 0.7, 0.2, 0.2, //
        0.7, 0.4, 0.2, 0.2, //
        0.2, 0.2, 0.2, 0.9, //
        0.2, 0.2, 0.9, 0.0, //
        0.2, 0.2, 0.2, 0.0,
    ];

    let details = InputFileDetails {
        size_x: 4,
        size_y: 5,
        geotransform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
        projection: String::new(),
    };

    let masked = |values: Vec<f32>| {
        MaskedGrid::new(Grid2::new(4, 5, values), Grid2::new(4, 5, mask.clone()))
    };

    SurveyFixture {
        details,
        depth: masked(depth),
        density: masked(density),
        uncertainty: masked(uncertainty),
    }
}
