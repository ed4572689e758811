// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HelION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::collections::{BTreeMap, HashMap};

use helion_types::SensorRegistry;

use crate::traits::SensorSnapshot;

/// One display attribute bound to a sensor. The unit is fixed at
/// construction; only the display string changes afterwards.
#[derive(Debug, Clone)]
struct Attribute {
    unit: String,
    display: String,
}

/// A published sensor entity.
///
/// The attribute map is structurally fixed at construction from the
/// configured attribute list; update cycles only rewrite the display strings.
#[derive(Debug, Clone)]
pub struct Sensor {
    name: String,
    unit: String,
    state: Option<f64>,
    attributes: BTreeMap<String, Attribute>,
}

impl Sensor {
    /// Create a sensor for `name` exposing the given attribute names.
    ///
    /// Returns None when a name does not resolve in the registry; config
    /// validation rejects that before any sensor is built.
    pub fn new(name: &str, attribute_names: &[String], registry: &SensorRegistry) -> Option<Self> {
        let definition = registry.get(name)?;

        let mut attributes = BTreeMap::new();
        for attr in attribute_names {
            let attr_def = registry.get(attr)?;
            attributes.insert(
                attr.clone(),
                Attribute {
                    unit: attr_def.unit.clone(),
                    display: String::new(),
                },
            );
        }

        Some(Self {
            name: name.to_string(),
            unit: definition.unit.clone(),
            state: None,
            attributes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> Option<f64> {
        self.state
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Attribute name -> current display string
    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.display.clone()))
            .collect()
    }

    /// Update state and attribute display strings from one cycle's scaled
    /// values, reporting whether anything changed.
    pub fn apply(&mut self, values: &HashMap<String, f64>) -> bool {
        let mut changed = false;

        for (attr_name, attr) in &mut self.attributes {
            let Some(value) = values.get(attr_name) else {
                continue;
            };
            let display = format!("{} {}", value, attr.unit);
            if attr.display != display {
                attr.display = display;
                changed = true;
            }
        }

        if let Some(new_state) = values.get(&self.name).copied()
            && self.state != Some(new_state)
        {
            self.state = Some(new_state);
            changed = true;
        }

        changed
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            name: self.name.clone(),
            state: self.state,
            unit: self.unit.clone(),
            attributes: self.attributes(),
        }
    }
}
