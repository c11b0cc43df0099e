use tracery::{ItemVariationStore, Point, TableCff2, TableGlyf, TableGvar, TableLoca};

fn on(x: i32, y: i32) -> Point {
    Point {
        x,
        y,
        on_curve: true,
        cubic: false,
    }
}

fn f2dot14(value: f32) -> [u8; 2] {
    ((value * 16384.0) as i16).to_be_bytes()
}

// Tuple scalar: the piecewise linear axis rule.

#[test]
fn peak_only_scalar_ramps_toward_the_peak() {
    assert_eq!(TableGvar::tuple_scalar(&[1.0], &[0.5], None), 0.5);
    assert_eq!(TableGvar::tuple_scalar(&[1.0], &[1.0], None), 1.0);
    assert_eq!(TableGvar::tuple_scalar(&[0.5], &[0.25], None), 0.5);
    // Beyond the peak the contribution caps at 1.
    assert_eq!(TableGvar::tuple_scalar(&[0.5], &[1.0], None), 1.0);
}

#[test]
fn peak_only_scalar_zeroes_on_sign_mismatch() {
    assert_eq!(TableGvar::tuple_scalar(&[1.0], &[-0.5], None), 0.0);
    assert_eq!(TableGvar::tuple_scalar(&[-1.0], &[0.5], None), 0.0);
}

#[test]
fn zero_peak_axis_contributes_one() {
    assert_eq!(TableGvar::tuple_scalar(&[0.0, 1.0], &[0.7, 0.5], None), 0.5);
}

#[test]
fn zero_coordinate_with_nonzero_peak_is_zero() {
    assert_eq!(TableGvar::tuple_scalar(&[1.0], &[0.0], None), 0.0);
    assert_eq!(TableGvar::tuple_scalar(&[1.0], &[], None), 0.0);
}

#[test]
fn intermediate_scalar_ramps_both_sides() {
    let start = [0.2f32];
    let end = [1.0f32];
    let peak = [0.6f32];
    assert_eq!(TableGvar::tuple_scalar(&peak, &[0.4], Some((&start, &end))), 0.5);
    assert_eq!(TableGvar::tuple_scalar(&peak, &[0.6], Some((&start, &end))), 1.0);
    assert_eq!(TableGvar::tuple_scalar(&peak, &[0.8], Some((&start, &end))), 0.5);
    // Outside the region.
    assert_eq!(TableGvar::tuple_scalar(&peak, &[0.1], Some((&start, &end))), 0.0);
    assert_eq!(TableGvar::tuple_scalar(&peak, &[1.1], Some((&start, &end))), 0.0);
}

#[test]
fn multi_axis_scalars_multiply() {
    assert_eq!(TableGvar::tuple_scalar(&[1.0, 1.0], &[0.5, 0.5], None), 0.25);
}

// Table level deltas.

/// One axis, long offsets, no shared tuples.
fn build_gvar(glyph_data: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&1u16.to_be_bytes()); // major
    out.extend_from_slice(&0u16.to_be_bytes()); // minor
    out.extend_from_slice(&1u16.to_be_bytes()); // axisCount
    out.extend_from_slice(&0u16.to_be_bytes()); // sharedTupleCount
    let offsets_len = (glyph_data.len() + 1) * 4;
    let shared_tuples_offset = 20 + offsets_len;
    out.extend_from_slice(&(shared_tuples_offset as u32).to_be_bytes());
    out.extend_from_slice(&(glyph_data.len() as u16).to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes()); // long offsets
    out.extend_from_slice(&(shared_tuples_offset as u32).to_be_bytes()); // data array
    let mut offset = 0u32;
    out.extend_from_slice(&offset.to_be_bytes());
    for data in glyph_data {
        offset += data.len() as u32;
        out.extend_from_slice(&offset.to_be_bytes());
    }
    for data in glyph_data {
        out.extend_from_slice(data);
    }
    out
}

/// A single tuple with an embedded peak at 1.0 and private point numbers listing point 0 with
/// delta (100, 0).
fn single_point_tuple() -> Vec<u8> {
    let mut serialized = Vec::new();
    serialized.extend_from_slice(&[1, 0, 0]); // one point number: 0
    serialized.extend_from_slice(&[0x00, 100]); // x deltas: one byte run
    serialized.push(0x80); // y deltas: one zero run

    let mut data = Vec::new();
    data.extend_from_slice(&1u16.to_be_bytes()); // tuple count
    let data_offset = 4 + 6; // count word + offset word + one header
    data.extend_from_slice(&(data_offset as u16).to_be_bytes());
    data.extend_from_slice(&(serialized.len() as u16).to_be_bytes());
    data.extend_from_slice(&0xA000u16.to_be_bytes()); // embedded peak | private points
    data.extend_from_slice(&f2dot14(1.0));
    data.extend_from_slice(&serialized);
    data
}

#[test]
fn glyph_deltas_scale_with_the_tuple_scalar() {
    let tuple = single_point_tuple();
    let gvar_data = build_gvar(&[&tuple]);
    let gvar = TableGvar::new(&gvar_data).unwrap();
    assert_eq!(gvar.glyph_deltas(0, 1, &[0.5]), vec![(50, 0)]);
    assert_eq!(gvar.glyph_deltas(0, 1, &[1.0]), vec![(100, 0)]);
    assert_eq!(gvar.glyph_deltas(0, 1, &[-0.5]), vec![(0, 0)]);
}

#[test]
fn glyphs_without_variation_data_get_zeros() {
    let tuple = single_point_tuple();
    let gvar_data = build_gvar(&[&tuple, &[]]);
    let gvar = TableGvar::new(&gvar_data).unwrap();
    assert_eq!(gvar.glyph_deltas(1, 2, &[1.0]), vec![(0, 0), (0, 0)]);
    assert_eq!(gvar.glyph_deltas(9, 1, &[1.0]), vec![(0, 0)]);
}

#[test]
fn all_points_form_covers_every_point() {
    // No point numbers anywhere: deltas apply to all points in order. Five entries cover one
    // real point plus the four phantoms.
    let mut serialized = Vec::new();
    serialized.extend_from_slice(&[0x04, 100, 3, 0, 0, 0]); // x: byte run of five
    serialized.push(0x84); // y: zero run of five

    let mut data = Vec::new();
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&10u16.to_be_bytes());
    data.extend_from_slice(&(serialized.len() as u16).to_be_bytes());
    data.extend_from_slice(&0x8000u16.to_be_bytes()); // embedded peak only
    data.extend_from_slice(&f2dot14(1.0));
    data.extend_from_slice(&serialized);

    let gvar_data = build_gvar(&[&data]);
    let gvar = TableGvar::new(&gvar_data).unwrap();
    assert_eq!(
        gvar.glyph_deltas(0, 5, &[1.0]),
        vec![(100, 0), (3, 0), (0, 0), (0, 0), (0, 0)]
    );
}

#[test]
fn shared_point_numbers_apply_to_all_tuples() {
    // The shared list names point 1; the tuple carries only deltas.
    let mut serialized = Vec::new();
    serialized.extend_from_slice(&[1, 0, 1]); // shared points: just point 1
    let tuple_data: &[u8] = &[0x00, 7, 0x80]; // dx 7, dy zero run
    serialized.extend_from_slice(tuple_data);

    let mut data = Vec::new();
    data.extend_from_slice(&0x8001u16.to_be_bytes()); // shared point numbers, one tuple
    data.extend_from_slice(&10u16.to_be_bytes());
    data.extend_from_slice(&(tuple_data.len() as u16).to_be_bytes());
    data.extend_from_slice(&0x8000u16.to_be_bytes());
    data.extend_from_slice(&f2dot14(1.0));
    data.extend_from_slice(&serialized);

    let gvar_data = build_gvar(&[&data]);
    let gvar = TableGvar::new(&gvar_data).unwrap();
    assert_eq!(gvar.glyph_deltas(0, 3, &[1.0]), vec![(0, 0), (7, 0), (0, 0)]);
}

#[test]
fn word_deltas_and_out_of_range_points_are_handled() {
    let mut serialized = Vec::new();
    serialized.extend_from_slice(&[2, 1, 0, 0, 90]); // points 0 and 90; 90 is out of range
    serialized.extend_from_slice(&[0x41]); // x: word run of two
    serialized.extend_from_slice(&300i16.to_be_bytes());
    serialized.extend_from_slice(&(-300i16).to_be_bytes());
    serialized.push(0x81); // y: zero run of two

    let mut data = Vec::new();
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&10u16.to_be_bytes());
    data.extend_from_slice(&(serialized.len() as u16).to_be_bytes());
    data.extend_from_slice(&0xA000u16.to_be_bytes());
    data.extend_from_slice(&f2dot14(1.0));
    data.extend_from_slice(&serialized);

    let gvar_data = build_gvar(&[&data]);
    let gvar = TableGvar::new(&gvar_data).unwrap();
    assert_eq!(gvar.glyph_deltas(0, 2, &[1.0]), vec![(300, 0), (0, 0)]);
}

#[test]
fn gvar_constructor_rejects_truncation() {
    assert!(TableGvar::new(&[0, 1, 0, 0, 0, 1]).is_err());
    assert!(TableGvar::new(&[0, 2, 0, 0]).is_err());
}

// Through the glyf pipeline.

fn simple_one_point_glyph(x: i16, y: i16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&1i16.to_be_bytes());
    for bound in [0i16, 0, x, y] {
        out.extend_from_slice(&bound.to_be_bytes());
    }
    out.extend_from_slice(&0u16.to_be_bytes()); // end point
    out.extend_from_slice(&0u16.to_be_bytes()); // no instructions
    out.push(0x01); // on curve, long deltas
    out.extend_from_slice(&x.to_be_bytes());
    out.extend_from_slice(&y.to_be_bytes());
    out
}

fn loca_for(glyphs: &[Vec<u8>]) -> TableLoca {
    let mut loca = Vec::new();
    let mut offset = 0u32;
    loca.extend_from_slice(&offset.to_be_bytes());
    for glyph in glyphs {
        offset += glyph.len() as u32;
        loca.extend_from_slice(&offset.to_be_bytes());
    }
    TableLoca::new(&loca, 1, glyphs.len() as u16).unwrap()
}

#[test]
fn outline_with_variation_moves_points() {
    let glyphs = vec![simple_one_point_glyph(100, 0)];
    let glyf_data: Vec<u8> = glyphs.concat();
    let loca = loca_for(&glyphs);

    // All-points deltas: the real point and the four phantoms.
    let mut serialized = Vec::new();
    serialized.extend_from_slice(&[0x04, 10, 0, 0, 0, 0]);
    serialized.push(0x84);
    let mut data = Vec::new();
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&10u16.to_be_bytes());
    data.extend_from_slice(&(serialized.len() as u16).to_be_bytes());
    data.extend_from_slice(&0x8000u16.to_be_bytes());
    data.extend_from_slice(&f2dot14(1.0));
    data.extend_from_slice(&serialized);
    let gvar_data = build_gvar(&[&data]);
    let gvar = TableGvar::new(&gvar_data).unwrap();

    let mut glyf = TableGlyf::new(&glyf_data);
    assert_eq!(
        glyf.outline_with_variation(&loca, Some(&gvar), 0, Some(&[1.0])),
        vec![vec![on(110, 0)]]
    );
    assert_eq!(
        glyf.outline_with_variation(&loca, Some(&gvar), 0, Some(&[0.5])),
        vec![vec![on(105, 0)]]
    );
}

#[test]
fn default_coordinates_match_the_plain_outline() {
    let glyphs = vec![simple_one_point_glyph(100, 0)];
    let glyf_data: Vec<u8> = glyphs.concat();
    let loca = loca_for(&glyphs);
    let tuple = single_point_tuple();
    let gvar_data = build_gvar(&[&tuple]);
    let gvar = TableGvar::new(&gvar_data).unwrap();
    let mut glyf = TableGlyf::new(&glyf_data);
    let plain = glyf.outline(&loca, 0);
    assert_eq!(
        glyf.outline_with_variation(&loca, Some(&gvar), 0, Some(&[0.0])),
        plain
    );
    assert_eq!(glyf.outline_with_variation(&loca, None, 0, None), plain);
}

// Item variation store.

fn build_ivs(regions: &[&[(f32, f32, f32)]], subtables: &[&[u16]]) -> Vec<u8> {
    let axis_count = regions.first().map(|axes| axes.len()).unwrap_or(0);
    let header_len = 2 + 4 + 2 + 4 * subtables.len();
    let region_list_len = 4 + regions.len() * axis_count * 6;

    let mut out = Vec::new();
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&(header_len as u32).to_be_bytes());
    out.extend_from_slice(&(subtables.len() as u16).to_be_bytes());
    let mut subtable_offset = header_len + region_list_len;
    for indexes in subtables {
        out.extend_from_slice(&(subtable_offset as u32).to_be_bytes());
        subtable_offset += 6 + indexes.len() * 2;
    }
    out.extend_from_slice(&(axis_count as u16).to_be_bytes());
    out.extend_from_slice(&(regions.len() as u16).to_be_bytes());
    for axes in regions {
        for &(start, peak, end) in axes.iter() {
            out.extend_from_slice(&f2dot14(start));
            out.extend_from_slice(&f2dot14(peak));
            out.extend_from_slice(&f2dot14(end));
        }
    }
    for indexes in subtables {
        out.extend_from_slice(&0u16.to_be_bytes()); // itemCount
        out.extend_from_slice(&0u16.to_be_bytes()); // wordDeltaCount
        out.extend_from_slice(&(indexes.len() as u16).to_be_bytes());
        for &index in indexes.iter() {
            out.extend_from_slice(&index.to_be_bytes());
        }
    }
    out
}

#[test]
fn region_count_follows_vsindex() {
    let store_data = build_ivs(
        &[&[(0.0, 1.0, 1.0)], &[(-1.0, -1.0, 0.0)]],
        &[&[0, 1], &[1]],
    );
    let store = ItemVariationStore::new(&store_data).unwrap();
    assert_eq!(store.region_count(0), 2);
    assert_eq!(store.region_count(1), 1);
    assert_eq!(store.region_count(2), 0);
}

#[test]
fn region_scalar_is_piecewise_linear() {
    let store_data = build_ivs(&[&[(0.0, 1.0, 1.0)], &[(0.0, 0.5, 1.0)]], &[&[0, 1]]);
    let store = ItemVariationStore::new(&store_data).unwrap();
    assert_eq!(store.region_scalar(0, 0, &[0.5]), 0.5);
    assert_eq!(store.region_scalar(0, 0, &[1.0]), 1.0);
    assert_eq!(store.region_scalar(0, 1, &[0.75]), 0.5);
    assert_eq!(store.region_scalar(0, 1, &[-0.5]), 0.0);
    // Unknown region or subtable contributes nothing.
    assert_eq!(store.region_scalar(0, 9, &[0.5]), 0.0);
    assert_eq!(store.region_scalar(7, 0, &[0.5]), 0.0);
}

// CFF2 blending.

fn dict_int(value: i32) -> Vec<u8> {
    let mut out = vec![29];
    out.extend_from_slice(&value.to_be_bytes());
    out
}

fn index2(items: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    if items.is_empty() {
        return out;
    }
    out.push(4);
    let mut offset = 1u32;
    out.extend_from_slice(&offset.to_be_bytes());
    for item in items {
        offset += item.len() as u32;
        out.extend_from_slice(&offset.to_be_bytes());
    }
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// A CFF2 table with optional variation store and optional local subrs behind a one entry
/// FDArray.
fn build_cff2(charstrings: &[&[u8]], store: Option<&[u8]>, local_subrs: Option<&[&[u8]]>) -> Vec<u8> {
    let gsubr_index = index2(&[]);
    let lsubr_index = local_subrs.map(|subrs| index2(subrs));
    let charstrings_index = index2(charstrings);

    let private = {
        let mut out = dict_int(6);
        out.push(19); // Subrs
        out
    };

    let top_dict_len = 6 + if store.is_some() { 6 } else { 0 } + if local_subrs.is_some() { 7 } else { 0 };
    let pos_gsubr = 5 + top_dict_len;
    let mut pos = pos_gsubr + gsubr_index.len();
    let pos_vstore = store.map(|store| {
        let at = pos;
        pos += 2 + store.len();
        at
    });
    let pos_fdarray = if local_subrs.is_some() {
        let font_dict = {
            let mut out = dict_int(private.len() as i32);
            out.extend_from_slice(&dict_int(0)); // patched below
            out.push(18);
            out
        };
        let at = pos;
        pos += index2(&[&font_dict]).len();
        Some(at)
    } else {
        None
    };
    let pos_private = if local_subrs.is_some() {
        let at = pos;
        pos += private.len() + lsubr_index.as_ref().unwrap().len();
        Some(at)
    } else {
        None
    };
    let pos_charstrings = pos;

    let mut top_dict = dict_int(pos_charstrings as i32);
    top_dict.push(17);
    if let Some(pos_vstore) = pos_vstore {
        top_dict.extend_from_slice(&dict_int(pos_vstore as i32));
        top_dict.push(24);
    }
    if let Some(pos_fdarray) = pos_fdarray {
        top_dict.extend_from_slice(&dict_int(pos_fdarray as i32));
        top_dict.extend_from_slice(&[12, 36]);
    }
    assert_eq!(top_dict.len(), top_dict_len);

    let mut cff2 = vec![2, 0, 5];
    cff2.extend_from_slice(&(top_dict_len as u16).to_be_bytes());
    cff2.extend_from_slice(&top_dict);
    cff2.extend_from_slice(&gsubr_index);
    if let Some(store) = store {
        cff2.extend_from_slice(&(store.len() as u16).to_be_bytes());
        cff2.extend_from_slice(store);
    }
    if let Some(pos_private) = pos_private {
        let font_dict = {
            let mut out = dict_int(private.len() as i32);
            out.extend_from_slice(&dict_int(pos_private as i32));
            out.push(18);
            out
        };
        cff2.extend_from_slice(&index2(&[&font_dict]));
        cff2.extend_from_slice(&private);
        cff2.extend_from_slice(lsubr_index.as_ref().unwrap());
    }
    cff2.extend_from_slice(&charstrings_index);
    assert_eq!(cff2.len(), pos_charstrings + charstrings_index.len());
    cff2
}

fn push(value: i32) -> u8 {
    assert!(value >= -107 && value <= 107);
    (value + 139) as u8
}

#[test]
fn blend_applies_region_deltas() {
    let store_data = build_ivs(&[&[(0.0, 1.0, 1.0)]], &[&[0]]);
    // 50 100 1 blend 0 rmoveto: one default (50) with one region delta (100).
    let program = [push(50), push(100), push(1), 16, push(0), 21];
    let data = build_cff2(&[&program], Some(&store_data), None);
    let cff2 = TableCff2::new(&data).unwrap();
    assert_eq!(cff2.outline(0, Some(&[1.0])).unwrap(), vec![vec![on(150, 0)]]);
    assert_eq!(cff2.outline(0, Some(&[0.5])).unwrap(), vec![vec![on(100, 0)]]);
    // At the default location the deltas vanish.
    assert_eq!(cff2.outline(0, None).unwrap(), vec![vec![on(50, 0)]]);
    assert_eq!(cff2.outline(0, Some(&[0.0])).unwrap(), vec![vec![on(50, 0)]]);
}

#[test]
fn blend_handles_multiple_values() {
    let store_data = build_ivs(&[&[(0.0, 1.0, 1.0)]], &[&[0]]);
    // Two defaults (10, 20) with deltas (5, -5); the blended pair feeds rmoveto.
    let program = [push(10), push(20), push(5), push(-5), push(2), 16, 21];
    let data = build_cff2(&[&program], Some(&store_data), None);
    let cff2 = TableCff2::new(&data).unwrap();
    assert_eq!(cff2.outline(0, Some(&[1.0])).unwrap(), vec![vec![on(15, 15)]]);
    assert_eq!(cff2.outline(0, None).unwrap(), vec![vec![on(10, 20)]]);
}

#[test]
fn vsindex_selects_the_subtable() {
    // Subtable 0 points at a region peaking at +1, subtable 1 at a region peaking at -1.
    let store_data = build_ivs(
        &[&[(0.0, 1.0, 1.0)], &[(-1.0, -1.0, 0.0)]],
        &[&[0], &[1]],
    );
    let switched = [push(1), 15, push(50), push(100), push(1), 16, push(0), 21];
    let data = build_cff2(&[&switched], Some(&store_data), None);
    let cff2 = TableCff2::new(&data).unwrap();
    // At +0.5 the second subtable's region is inactive, so the default stands.
    assert_eq!(cff2.outline(0, Some(&[0.5])).unwrap(), vec![vec![on(50, 0)]]);
    // At -1.0 it peaks.
    assert_eq!(cff2.outline(0, Some(&[-1.0])).unwrap(), vec![vec![on(150, 0)]]);
}

#[test]
fn cff2_without_store_passes_defaults_through() {
    // blend with no variation store: the count pops and the defaults stand.
    let program = [push(30), push(40), push(2), 16, 21];
    let data = build_cff2(&[&program], None, None);
    let cff2 = TableCff2::new(&data).unwrap();
    assert_eq!(cff2.outline(0, Some(&[1.0])).unwrap(), vec![vec![on(30, 40)]]);
}

#[test]
fn cff2_has_no_width_operand() {
    // Three operands before rmoveto would mean a leading width in CFF. CFF2 never consumes
    // one, so the FIFO read starts at the bottom of the stack.
    let program = [push(9), push(10), push(20), 21];
    let data = build_cff2(&[&program], None, None);
    let cff2 = TableCff2::new(&data).unwrap();
    assert_eq!(cff2.outline(0, None).unwrap(), vec![vec![on(9, 10)]]);
}

#[test]
fn cff2_local_subrs_resolve_through_the_font_dict() {
    let subr: &[u8] = &[push(10), push(20), 21, 11];
    let program = [push(-107), 10];
    let data = build_cff2(&[&program], None, Some(&[subr]));
    let cff2 = TableCff2::new(&data).unwrap();
    assert_eq!(cff2.outline(0, None).unwrap(), vec![vec![on(10, 20)]]);
    assert!(cff2.variation_store().is_none());
}

#[test]
fn cff2_out_of_range_glyph_is_none() {
    let data = build_cff2(&[&[push(1), push(1), 21]], None, None);
    let cff2 = TableCff2::new(&data).unwrap();
    assert!(cff2.outline(0, None).is_some());
    assert!(cff2.outline(1, None).is_none());
}
