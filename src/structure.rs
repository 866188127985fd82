use crate::config::SplineConfig;
use crate::consts::PARTON_COUNT;
use crate::error::PfResult;
use crate::evolution::{EvolutionEngine, EvolvedPdf};
use crate::pdf::Parton;
use crate::spline::{BeamCharge, SplineHandle, SplineStore};
use crate::xsec::{Electroweak, Kinematics};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

/// Structure functions, numbered by the power they enter the cross section with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
pub enum StructureFunction {
    FL = 1,
    F2 = 2,
    F3 = 3,
}

impl StructureFunction {
    pub fn id(self) -> u8 {
        self as u8
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuarkClass {
    Up,
    Down,
}

/// Species selectors for the up- and down-type combinations, plus the
/// electroweak parameters that turn them into γ/Z couplings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarkCouplings {
    pub sum_up: [f64; PARTON_COUNT],
    pub sum_down: [f64; PARTON_COUNT],
    pub valence_up: [f64; PARTON_COUNT],
    pub valence_down: [f64; PARTON_COUNT],
    pub electroweak: Electroweak,
}

fn selector(quarks: &[Parton], antiquarks: &[Parton], anti_sign: f64) -> [f64; PARTON_COUNT] {
    let mut w = [0.0; PARTON_COUNT];
    for q in quarks {
        w[q.index()] = 1.0;
    }
    for q in antiquarks {
        w[q.index()] = anti_sign;
    }
    w
}

impl Default for QuarkCouplings {
    fn default() -> Self {
        let up = [Parton::Up, Parton::Charm];
        let up_bar = [Parton::UpBar, Parton::CharmBar];
        let down = [Parton::Down, Parton::Strange, Parton::Bottom];
        let down_bar = [Parton::DownBar, Parton::StrangeBar, Parton::BottomBar];
        Self {
            sum_up: selector(&up, &up_bar, 1.0),
            sum_down: selector(&down, &down_bar, 1.0),
            valence_up: selector(&up, &up_bar, -1.0),
            valence_down: selector(&down, &down_bar, -1.0),
            electroweak: Electroweak::default(),
        }
    }
}

impl QuarkCouplings {
    /// Species weights used to build one structure function of one class.
    pub fn weights(&self, class: QuarkClass, sf: StructureFunction) -> &[f64; PARTON_COUNT] {
        match (class, sf) {
            (QuarkClass::Up, StructureFunction::F3) => &self.valence_up,
            (QuarkClass::Down, StructureFunction::F3) => &self.valence_down,
            (QuarkClass::Up, _) => &self.sum_up,
            (QuarkClass::Down, _) => &self.sum_down,
        }
    }
}

/// Resolved handles of every table the pipeline fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplineTables {
    components: [[SplineHandle; 3]; 2],
    xsec: [SplineHandle; 2],
}

impl SplineTables {
    /// Registers the component and cross-section tables in `store`.
    pub fn register(store: &mut SplineStore) -> PfResult<Self> {
        let mut components = Vec::with_capacity(2);
        for class in QuarkClass::iter() {
            let mut row = Vec::with_capacity(3);
            for sf in StructureFunction::iter() {
                row.push(store.register(&format!("{}_{}", sf, class))?);
            }
            components.push([row[0], row[1], row[2]]);
        }
        let xsec = [
            store.register(&format!("xsec_{}", BeamCharge::EPlus))?,
            store.register(&format!("xsec_{}", BeamCharge::EMinus))?,
        ];
        Ok(Self {
            components: [components[0], components[1]],
            xsec,
        })
    }

    pub fn component(&self, class: QuarkClass, sf: StructureFunction) -> SplineHandle {
        self.components[class as usize][sf as usize - 1]
    }

    pub fn xsec(&self, charge: BeamCharge) -> SplineHandle {
        self.xsec[charge as usize]
    }
}

/// Fills every structure-function table from the evolved PDF, then both
/// cross-section tables (e⁺ first, then e⁻) from those components.
pub fn build_splines(
    engine: &dyn EvolutionEngine,
    store: &mut SplineStore,
    tables: &SplineTables,
    evolved: &EvolvedPdf,
    couplings: &QuarkCouplings,
    spline: &SplineConfig,
) -> PfResult<()> {
    let mut filled = 0;
    for class in QuarkClass::iter() {
        for sf in StructureFunction::iter() {
            let weights = couplings.weights(class, sf);
            store.fill_profiles(tables.component(class, sf), |iq| {
                engine.structure_function(evolved, sf, weights, iq)
            })?;
            filled += 1;
        }
    }

    let s = spline.s();
    let cut = spline.rs_cut * spline.rs_cut;
    let ew = &couplings.electroweak;
    for charge in BeamCharge::iter() {
        store.select_charge(charge);
        let target = tables.xsec(charge);
        store.fill_nodes(target, |st, p| {
            if p.q2 > p.x * cut {
                return 0.0;
            }
            let component = |class, sf| st.node_value(tables.component(class, sf), p.ix, p.iq);
            let (a_u, b_u) = ew.coefficients(QuarkClass::Up, p.q2);
            let (a_d, b_d) = ew.coefficients(QuarkClass::Down, p.q2);
            let f2 = a_u * component(QuarkClass::Up, StructureFunction::F2)
                + a_d * component(QuarkClass::Down, StructureFunction::F2);
            let fl = a_u * component(QuarkClass::Up, StructureFunction::FL)
                + a_d * component(QuarkClass::Down, StructureFunction::FL);
            let xf3 = b_u * component(QuarkClass::Up, StructureFunction::F3)
                + b_d * component(QuarkClass::Down, StructureFunction::F3);
            let kin = Kinematics::new(p.x, p.q2, s);
            ew.reduced_differential(st.charge(), &kin, f2, xf3, fl)
        })?;
    }
    debug!("Filled {} structure-function tables and both cross-section tables", filled);
    Ok(())
}
