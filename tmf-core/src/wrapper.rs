/// Library handle: version queries and small value constructors
use crate::color::Color;
use crate::model::Model;
use crate::transform::Transform;

/// Entry point mirroring the handle every sample acquires first.
///
/// The handle carries no state; it exists so callers have one place to ask
/// for the library version and to create models.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wrapper;

impl Wrapper {
    pub fn new() -> Self {
        Self
    }

    /// `(major, minor, micro)` of this library
    pub fn library_version(&self) -> (u32, u32, u32) {
        let part = |s: &str| s.parse().unwrap_or(0);
        (
            part(env!("CARGO_PKG_VERSION_MAJOR")),
            part(env!("CARGO_PKG_VERSION_MINOR")),
            part(env!("CARGO_PKG_VERSION_PATCH")),
        )
    }

    pub fn prerelease_information(&self) -> Option<String> {
        let pre = env!("CARGO_PKG_VERSION_PRE");
        (!pre.is_empty()).then(|| pre.to_string())
    }

    /// Set at compile time through `TMF_BUILD_INFO`
    pub fn build_information(&self) -> Option<String> {
        option_env!("TMF_BUILD_INFO")
            .filter(|info| !info.is_empty())
            .map(str::to_string)
    }

    /// `major.minor.micro[-pre][+build]`
    pub fn version_string(&self) -> String {
        let (major, minor, micro) = self.library_version();
        let mut version = format!("{major}.{minor}.{micro}");
        if let Some(pre) = self.prerelease_information() {
            version.push('-');
            version.push_str(&pre);
        }
        if let Some(build) = self.build_information() {
            version.push('+');
            version.push_str(&build);
        }
        version
    }

    pub fn create_model(&self) -> Model {
        Model::new()
    }

    pub fn identity_transform(&self) -> Transform {
        Transform::identity()
    }

    pub fn rgba_to_color(&self, r: u8, g: u8, b: u8, a: u8) -> Color {
        Color::rgba(r, g, b, a)
    }

    pub fn float_rgba_to_color(&self, r: f32, g: f32, b: f32, a: f32) -> Color {
        Color::from_floats(r, g, b, a)
    }

    pub fn color_to_rgba(&self, color: Color) -> (u8, u8, u8, u8) {
        (color.r, color.g, color.b, color.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_package() {
        let wrapper = Wrapper::new();
        let (major, minor, micro) = wrapper.library_version();
        assert_eq!(
            format!("{major}.{minor}.{micro}"),
            env!("CARGO_PKG_VERSION").split(['-', '+']).next().unwrap()
        );
        assert!(wrapper.version_string().starts_with(&format!("{major}.{minor}.{micro}")));
    }

    #[test]
    fn test_fresh_model_is_empty() {
        let model = Wrapper::new().create_model();
        assert!(model.objects().is_empty());
        assert!(model.build_items().is_empty());
    }

    #[test]
    fn test_color_roundtrip() {
        let wrapper = Wrapper::new();
        let color = wrapper.rgba_to_color(255, 128, 0, 255);
        assert_eq!(wrapper.color_to_rgba(color), (255, 128, 0, 255));
        assert_eq!(wrapper.float_rgba_to_color(1.0, 0.0, 0.0, 1.0), Color::rgb(255, 0, 0));
    }
}
