use super::*;

#[test]
fn index_formula_wraps_at_256() {
    assert_eq!(colormap_index(0, 255), 0);
    assert_eq!(colormap_index(1, 255), 1);
    assert_eq!(colormap_index(255, 255), 255);
    assert_eq!(colormap_index(256, 255), 0);
    assert_eq!(colormap_index(3, 10), 76);
    assert_eq!(colormap_index(7, 0), colormap_index(7, 1));
}

#[test]
fn endpoints_match_reference_colors() {
    assert_eq!(Colormap::Gray.sample(0), Rgba8::opaque(0, 0, 0));
    assert_eq!(Colormap::Gray.sample(255), Rgba8::opaque(255, 255, 255));
    assert_eq!(Colormap::Hsv.sample(0), Rgba8::opaque(255, 0, 0));
    assert_eq!(Colormap::Viridis.sample(0), Rgba8::opaque(68, 1, 84));
    assert_eq!(Colormap::Viridis.sample(255), Rgba8::opaque(253, 231, 37));
    assert_eq!(Colormap::Jet.sample(0), Rgba8::opaque(0, 0, 128));
    assert_eq!(Colormap::Jet.sample(255), Rgba8::opaque(128, 0, 0));
}

#[test]
fn names_are_case_insensitive() {
    assert_eq!(Colormap::from_name(" Jet "), Some(Colormap::Jet));
    assert_eq!(Colormap::from_name("grey"), Some(Colormap::Gray));
    assert_eq!(Colormap::from_name("magma"), None);
}
