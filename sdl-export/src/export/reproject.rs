//! Reprojection des géométries avec PROJ
//!
//! Disponible uniquement avec le feature `reproject`. Sans lui, seule la
//! projection identité est acceptée.

use anyhow::{bail, Result};
use geo::Geometry;

use sdl::Crs;

/// Code EPSG source d'un flux, requis pour reprojeter
pub fn source_epsg(crs: Option<&Crs>) -> Result<u32> {
    match crs {
        Some(crs) => match crs.epsg() {
            Some(epsg) => Ok(epsg),
            None => bail!("Source CRS {} has no EPSG code, cannot reproject", crs),
        },
        None => bail!("Source has no CRS, use --srs to declare one before reprojecting"),
    }
}

/// Vérifie si la reprojection est disponible
pub fn is_available() -> bool {
    cfg!(feature = "reproject")
}

#[cfg(feature = "reproject")]
mod imp {
    use anyhow::{Context, Result};
    use geo::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};
    use proj::Proj;

    /// Reprojection entre deux codes EPSG
    pub struct Reprojector {
        proj: Option<Proj>,
        source_epsg: u32,
        target_epsg: u32,
    }

    impl Reprojector {
        pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
            let proj = if source_epsg == target_epsg {
                None
            } else {
                let source = format!("EPSG:{}", source_epsg);
                let target = format!("EPSG:{}", target_epsg);
                Some(
                    Proj::new_known_crs(&source, &target, None).with_context(|| {
                        format!("Failed to create projection from {} to {}", source, target)
                    })?,
                )
            };

            Ok(Self {
                proj,
                source_epsg,
                target_epsg,
            })
        }

        pub fn source_epsg(&self) -> u32 {
            self.source_epsg
        }

        pub fn target_epsg(&self) -> u32 {
            self.target_epsg
        }

        /// Transforme les géométries produites par le lecteur SDL
        pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
            let Some(proj) = &self.proj else {
                return Ok(geom.clone());
            };

            match geom {
                Geometry::Point(p) => {
                    let (x, y) = proj
                        .convert((p.x(), p.y()))
                        .context("Coordinate transformation failed")?;
                    Ok(Geometry::Point(Point::new(x, y)))
                }
                Geometry::MultiLineString(mls) => {
                    let lines: Result<Vec<LineString>> =
                        mls.0.iter().map(|ls| transform_linestring(proj, ls)).collect();
                    Ok(Geometry::MultiLineString(MultiLineString::new(lines?)))
                }
                Geometry::MultiPolygon(mp) => {
                    let polys: Result<Vec<Polygon>> =
                        mp.0.iter().map(|p| transform_polygon(proj, p)).collect();
                    Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
                }
                other => anyhow::bail!("Unexpected geometry type for SDL: {:?}", other),
            }
        }
    }

    /// Conversion par lot des sommets d'une ligne
    fn transform_linestring(proj: &Proj, ls: &LineString) -> Result<LineString> {
        let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();
        proj.convert_array(&mut coords)
            .context("Batch coordinate transformation failed")?;
        Ok(LineString::new(
            coords.into_iter().map(|(x, y)| Coord { x, y }).collect(),
        ))
    }

    fn transform_polygon(proj: &Proj, p: &Polygon) -> Result<Polygon> {
        let exterior = transform_linestring(proj, p.exterior())?;
        let interiors: Result<Vec<LineString>> = p
            .interiors()
            .iter()
            .map(|ls| transform_linestring(proj, ls))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}

#[cfg(not(feature = "reproject"))]
mod imp {
    use anyhow::{bail, Result};
    use geo::Geometry;

    /// Sans PROJ : seule l'identité est possible
    pub struct Reprojector {
        epsg: u32,
    }

    impl Reprojector {
        pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
            if source_epsg != target_epsg {
                bail!(
                    "Reprojection from EPSG:{} to EPSG:{} requires the 'reproject' feature. \
                     Build with: cargo build --features reproject",
                    source_epsg,
                    target_epsg
                );
            }
            Ok(Self { epsg: source_epsg })
        }

        pub fn source_epsg(&self) -> u32 {
            self.epsg
        }

        pub fn target_epsg(&self) -> u32 {
            self.epsg
        }

        pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
            Ok(geom.clone())
        }
    }
}

pub use imp::Reprojector;

impl Reprojector {
    /// Reprojette une géométrie éventuellement absente
    pub fn transform(&self, geom: Option<&Geometry>) -> Result<Option<Geometry>> {
        geom.map(|g| self.transform_geometry(g)).transpose()
    }
}
