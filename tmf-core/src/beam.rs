/// Beam lattice extension: beams between mesh vertices
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ResourceId;

/// How the end of a beam is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CapMode {
    #[default]
    Sphere,
    HemiSphere,
    Butt,
}

impl CapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapMode::Sphere => "sphere",
            CapMode::HemiSphere => "hemisphere",
            CapMode::Butt => "butt",
        }
    }
}

impl fmt::Display for CapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sphere" => Ok(CapMode::Sphere),
            "hemisphere" => Ok(CapMode::HemiSphere),
            "butt" => Ok(CapMode::Butt),
            _ => Err(Error::invalid_param(format!("invalid beam cap mode: {s}"))),
        }
    }
}

/// How a lattice is clipped against its clipping mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClipMode {
    #[default]
    None,
    Inside,
    Outside,
}

impl ClipMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipMode::None => "none",
            ClipMode::Inside => "inside",
            ClipMode::Outside => "outside",
        }
    }
}

impl FromStr for ClipMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ClipMode::None),
            "inside" => Ok(ClipMode::Inside),
            "outside" => Ok(ClipMode::Outside),
            _ => Err(Error::invalid_param(format!("invalid clipping mode: {s}"))),
        }
    }
}

/// A capped cone between two vertices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    pub indices: [u32; 2],
    pub radii: [f64; 2],
    pub cap_modes: [CapMode; 2],
}

impl Beam {
    pub fn new(v0: u32, v1: u32, r0: f64, r1: f64, c0: CapMode, c1: CapMode) -> Self {
        Self {
            indices: [v0, v1],
            radii: [r0, r1],
            cap_modes: [c0, c1],
        }
    }
}

/// A named selection of beams
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeamSet {
    pub name: String,
    pub identifier: String,
    pub references: Vec<u32>,
}

/// Lattice data attached to a mesh object
#[derive(Debug, Clone, PartialEq)]
pub struct BeamLattice {
    pub(crate) min_length: f64,
    pub(crate) default_radius: f64,
    pub(crate) default_cap_mode: CapMode,
    pub(crate) clip_mode: ClipMode,
    pub(crate) clipping_mesh: Option<ResourceId>,
    pub(crate) representation_mesh: Option<ResourceId>,
    pub(crate) beams: Vec<Beam>,
    pub(crate) beam_sets: Vec<BeamSet>,
}

impl Default for BeamLattice {
    fn default() -> Self {
        Self {
            min_length: 0.0001,
            default_radius: 1.0,
            default_cap_mode: CapMode::Sphere,
            clip_mode: ClipMode::None,
            clipping_mesh: None,
            representation_mesh: None,
            beams: Vec::new(),
            beam_sets: Vec::new(),
        }
    }
}

impl BeamLattice {
    pub fn min_length(&self) -> f64 {
        self.min_length
    }

    pub fn default_radius(&self) -> f64 {
        self.default_radius
    }

    pub fn default_cap_mode(&self) -> CapMode {
        self.default_cap_mode
    }

    pub fn clipping(&self) -> (ClipMode, Option<ResourceId>) {
        (self.clip_mode, self.clipping_mesh)
    }

    pub fn representation(&self) -> Option<ResourceId> {
        self.representation_mesh
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    pub fn beam(&self, index: u32) -> Option<&Beam> {
        self.beams.get(index as usize)
    }

    pub fn beam_count(&self) -> u32 {
        self.beams.len() as u32
    }

    pub fn beam_sets(&self) -> &[BeamSet] {
        &self.beam_sets
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }
}

/// Mutable view of a mesh's lattice that knows the mesh vertex count
pub struct BeamLatticeMut<'a> {
    pub(crate) vertex_count: u32,
    pub(crate) lattice: &'a mut BeamLattice,
}

impl<'a> BeamLatticeMut<'a> {
    fn check_beam(&self, beam: &Beam) -> Result<()> {
        for &index in &beam.indices {
            if index >= self.vertex_count {
                return Err(Error::IndexOutOfRange {
                    what: "vertex",
                    index,
                    count: self.vertex_count,
                });
            }
        }
        if beam.indices[0] == beam.indices[1] {
            return Err(Error::invalid_param(format!(
                "beam connects vertex {} to itself",
                beam.indices[0]
            )));
        }
        if beam.radii.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(Error::invalid_param(format!(
                "beam radii must be positive, got {:?}",
                beam.radii
            )));
        }
        Ok(())
    }

    /// Append a beam and return its index
    pub fn add_beam(&mut self, beam: Beam) -> Result<u32> {
        self.check_beam(&beam)?;
        self.lattice.beams.push(beam);
        Ok(self.lattice.beam_count() - 1)
    }

    pub fn set_beam(&mut self, index: u32, beam: Beam) -> Result<()> {
        self.check_beam(&beam)?;
        let count = self.lattice.beam_count();
        let slot = self
            .lattice
            .beams
            .get_mut(index as usize)
            .ok_or(Error::IndexOutOfRange {
                what: "beam",
                index,
                count,
            })?;
        *slot = beam;
        Ok(())
    }

    /// Replace all beams; beam sets referencing removed beams are dropped
    pub fn set_beams(&mut self, beams: Vec<Beam>) -> Result<()> {
        for beam in &beams {
            self.check_beam(beam)?;
        }
        let count = beams.len() as u32;
        self.lattice.beams = beams;
        self.lattice
            .beam_sets
            .retain(|set| set.references.iter().all(|r| *r < count));
        Ok(())
    }

    pub fn beam_count(&self) -> u32 {
        self.lattice.beam_count()
    }

    pub fn set_min_length(&mut self, min_length: f64) -> Result<()> {
        if !min_length.is_finite() || min_length <= 0.0 {
            return Err(Error::invalid_param(format!(
                "minimum beam length must be positive, got {min_length}"
            )));
        }
        self.lattice.min_length = min_length;
        Ok(())
    }

    pub fn set_default_radius(&mut self, radius: f64) -> Result<()> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::invalid_param(format!(
                "default beam radius must be positive, got {radius}"
            )));
        }
        self.lattice.default_radius = radius;
        Ok(())
    }

    pub fn set_default_cap_mode(&mut self, cap_mode: CapMode) {
        self.lattice.default_cap_mode = cap_mode;
    }

    /// Clipping mesh ids are resolved when the model is validated
    pub fn set_clipping(&mut self, mode: ClipMode, mesh: Option<ResourceId>) -> Result<()> {
        if mode != ClipMode::None && mesh.is_none() {
            return Err(Error::invalid_param("clipping requires a clipping mesh"));
        }
        self.lattice.clip_mode = mode;
        self.lattice.clipping_mesh = if mode == ClipMode::None { None } else { mesh };
        Ok(())
    }

    pub fn set_representation(&mut self, mesh: Option<ResourceId>) {
        self.lattice.representation_mesh = mesh;
    }

    /// Add a beam set and return its index
    pub fn add_beam_set(
        &mut self,
        name: impl Into<String>,
        identifier: impl Into<String>,
        references: Vec<u32>,
    ) -> Result<u32> {
        let count = self.lattice.beam_count();
        if let Some(&index) = references.iter().find(|r| **r >= count) {
            return Err(Error::IndexOutOfRange {
                what: "beam",
                index,
                count,
            });
        }
        self.lattice.beam_sets.push(BeamSet {
            name: name.into(),
            identifier: identifier.into(),
            references,
        });
        Ok(self.lattice.beam_sets.len() as u32 - 1)
    }
}

impl std::ops::Deref for BeamLatticeMut<'_> {
    type Target = BeamLattice;

    fn deref(&self) -> &BeamLattice {
        self.lattice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice_view(lattice: &mut BeamLattice, vertex_count: u32) -> BeamLatticeMut<'_> {
        BeamLatticeMut {
            vertex_count,
            lattice,
        }
    }

    #[test]
    fn test_cap_mode_parse() {
        assert_eq!("Butt".parse::<CapMode>().unwrap(), CapMode::Butt);
        assert_eq!("HemiSphere".parse::<CapMode>().unwrap(), CapMode::HemiSphere);
        assert!("round".parse::<CapMode>().is_err());
    }

    #[test]
    fn test_add_beam_validates() {
        let mut lattice = BeamLattice::default();
        let mut view = lattice_view(&mut lattice, 4);

        let ok = Beam::new(0, 1, 1.0, 1.5, CapMode::Sphere, CapMode::Butt);
        assert_eq!(view.add_beam(ok).unwrap(), 0);

        let out_of_range = Beam::new(0, 4, 1.0, 1.0, CapMode::Butt, CapMode::Butt);
        assert!(matches!(
            view.add_beam(out_of_range),
            Err(Error::IndexOutOfRange { index: 4, .. })
        ));

        let self_loop = Beam::new(2, 2, 1.0, 1.0, CapMode::Butt, CapMode::Butt);
        assert!(view.add_beam(self_loop).is_err());

        let flat = Beam::new(1, 2, 0.0, 1.0, CapMode::Butt, CapMode::Butt);
        assert!(view.add_beam(flat).is_err());
        assert_eq!(view.beam_count(), 1);
    }

    #[test]
    fn test_min_length() {
        let mut lattice = BeamLattice::default();
        let mut view = lattice_view(&mut lattice, 2);
        view.set_min_length(0.005).unwrap();
        assert!(view.set_min_length(-1.0).is_err());
        assert_eq!(lattice.min_length(), 0.005);
    }

    #[test]
    fn test_beam_sets() {
        let mut lattice = BeamLattice::default();
        let mut view = lattice_view(&mut lattice, 3);
        view.add_beam(Beam::new(0, 1, 1.0, 1.0, CapMode::Sphere, CapMode::Sphere))
            .unwrap();
        view.add_beam(Beam::new(1, 2, 1.0, 1.0, CapMode::Sphere, CapMode::Sphere))
            .unwrap();
        assert_eq!(view.add_beam_set("struts", "s1", vec![0, 1]).unwrap(), 0);
        assert!(view.add_beam_set("bad", "s2", vec![2]).is_err());

        view.set_beams(vec![Beam::new(0, 2, 1.0, 1.0, CapMode::Butt, CapMode::Butt)])
            .unwrap();
        assert!(view.beam_sets().is_empty());
    }

    #[test]
    fn test_clipping_requires_mesh() {
        let mut lattice = BeamLattice::default();
        let mut view = lattice_view(&mut lattice, 0);
        assert!(view.set_clipping(ClipMode::Inside, None).is_err());
        view.set_clipping(ClipMode::Outside, Some(7)).unwrap();
        assert_eq!(view.clipping(), (ClipMode::Outside, Some(7)));
    }
}
