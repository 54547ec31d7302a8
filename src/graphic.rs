//! Colour legends and the graphic payloads handed back to hosts.

use nalgebra::Point3;
use ndarray::Array1;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use crate::error::{RadianceError, Result};
use crate::geometry::Mesh3D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn lerp(self, other: Color, t: f32) -> Color {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

/// Blue-to-red ramp used when no colours are given.
pub const DEFAULT_COLORS: [Color; 10] = [
    Color::new(75, 107, 169),
    Color::new(115, 147, 202),
    Color::new(170, 200, 247),
    Color::new(193, 213, 208),
    Color::new(245, 239, 103),
    Color::new(252, 230, 74),
    Color::new(239, 156, 21),
    Color::new(234, 123, 0),
    Color::new(234, 74, 0),
    Color::new(234, 38, 0),
];

/// User overrides for a legend. `None` bounds come from the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendParameters {
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub segment_count: usize,
    pub title: Option<String>,
    pub colors: Vec<Color>,
}

impl Default for LegendParameters {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            segment_count: 11,
            title: None,
            colors: DEFAULT_COLORS.to_vec(),
        }
    }
}

/// Maps values onto colours between `min` and `max`.
pub trait ColorLegend {
    fn value_colors(&self, values: &[f32], min: f32, max: f32) -> Vec<Color>;
}

/// Piecewise-linear interpolation along a colour ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientLegend {
    colors: Vec<Color>,
}

impl GradientLegend {
    pub fn new(colors: Vec<Color>) -> Result<Self> {
        if colors.is_empty() {
            return Err(RadianceError::InvalidParameter(
                "a legend needs at least one colour".into(),
            ));
        }
        Ok(Self { colors })
    }

    fn color_at(&self, t: f32) -> Color {
        let last = self.colors.len() - 1;
        if last == 0 {
            return self.colors[0];
        }
        let pos = t.clamp(0.0, 1.0) * last as f32;
        let i = (pos.floor() as usize).min(last - 1);
        self.colors[i].lerp(self.colors[i + 1], pos - i as f32)
    }
}

impl Default for GradientLegend {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS.to_vec(),
        }
    }
}

impl ColorLegend for GradientLegend {
    fn value_colors(&self, values: &[f32], min: f32, max: f32) -> Vec<Color> {
        let range = max - min;
        values
            .iter()
            .map(|&v| {
                let t = if range > 0.0 { (v - min) / range } else { 0.0 };
                self.color_at(t)
            })
            .collect()
    }
}

/// Values, their colours, resolved legend bounds and placement.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicContainer {
    values: Array1<f32>,
    min_point: Point3<f32>,
    max_point: Point3<f32>,
    legend_parameters: LegendParameters,
    min: f32,
    max: f32,
    colors: Vec<Color>,
}

impl GraphicContainer {
    /// Colour `values` with a gradient built from the legend's colours.
    pub fn new(
        values: Array1<f32>,
        min_point: Point3<f32>,
        max_point: Point3<f32>,
        legend_parameters: LegendParameters,
    ) -> Result<Self> {
        let legend = GradientLegend::new(legend_parameters.colors.clone())?;
        Ok(Self::with_legend(values, min_point, max_point, legend_parameters, &legend))
    }

    pub fn with_legend(
        values: Array1<f32>,
        min_point: Point3<f32>,
        max_point: Point3<f32>,
        legend_parameters: LegendParameters,
        legend: &dyn ColorLegend,
    ) -> Self {
        let (data_min, data_max) = if values.is_empty() {
            (0.0, 0.0)
        } else {
            (*values.min_skipnan(), *values.max_skipnan())
        };
        let min = legend_parameters.min.unwrap_or(data_min);
        let max = legend_parameters.max.unwrap_or(data_max);
        let colors = legend.value_colors(&values.to_vec(), min, max);
        Self {
            values,
            min_point,
            max_point,
            legend_parameters,
            min,
            max,
            colors,
        }
    }

    pub fn values(&self) -> &Array1<f32> {
        &self.values
    }

    pub fn value_colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn min_point(&self) -> Point3<f32> {
        self.min_point
    }

    pub fn max_point(&self) -> Point3<f32> {
        self.max_point
    }

    pub fn legend_parameters(&self) -> &LegendParameters {
        &self.legend_parameters
    }

    pub fn title(&self) -> Option<&str> {
        self.legend_parameters.title.as_deref()
    }
}

/// Mesh with one colour per face, or per vertex when `by_vertex`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColoredMesh {
    pub mesh: Mesh3D,
    pub colors: Vec<Color>,
    pub by_vertex: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_gradient_ends() {
        let legend = GradientLegend::default();
        let colors = legend.value_colors(&[0.0, 10.0, 20.0, -5.0], 0.0, 10.0);
        assert_eq!(colors[0], DEFAULT_COLORS[0]);
        assert_eq!(colors[1], DEFAULT_COLORS[9]);
        assert_eq!(colors[2], DEFAULT_COLORS[9]);
        assert_eq!(colors[3], DEFAULT_COLORS[0]);
    }

    #[test]
    fn test_gradient_midpoint() {
        let legend = GradientLegend::new(vec![Color::new(0, 0, 0), Color::new(200, 100, 50)]).unwrap();
        let colors = legend.value_colors(&[0.5], 0.0, 1.0);
        assert_eq!(colors[0], Color::new(100, 50, 25));
        assert!(GradientLegend::new(vec![]).is_err());
    }

    #[test]
    fn test_container_bounds() {
        let graphic = GraphicContainer::new(
            array![3.0, 1.0, 2.0],
            Point3::origin(),
            Point3::new(1.0, 1.0, 0.0),
            LegendParameters::default(),
        )
        .unwrap();
        assert_eq!(graphic.min(), 1.0);
        assert_eq!(graphic.max(), 3.0);
        assert_eq!(graphic.value_colors().len(), 3);

        let params = LegendParameters {
            min: Some(0.0),
            max: Some(10.0),
            ..Default::default()
        };
        let graphic =
            GraphicContainer::new(array![3.0], Point3::origin(), Point3::origin(), params).unwrap();
        assert_eq!((graphic.min(), graphic.max()), (0.0, 10.0));
    }

    #[test]
    fn test_empty_values() {
        let graphic = GraphicContainer::new(
            Array1::zeros(0),
            Point3::origin(),
            Point3::origin(),
            LegendParameters::default(),
        )
        .unwrap();
        assert!(graphic.value_colors().is_empty());
    }
}
