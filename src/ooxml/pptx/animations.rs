//! Animation effects and their bindings to shapes.
//!
//! An effect leaf in the timing tree is a behavior element (`p:animEffect`,
//! `p:set`, `p:anim`, ...) whose `p:cBhvr/p:tgtEl/p:spTgt/@spid` names the
//! animated shape. [`AnimationBinding`] is the read-only view of such a leaf;
//! [`EffectSpec`] describes a leaf to be appended by
//! [`bind_effect`](crate::ooxml::pptx::timing::bind_effect).

use crate::common::xml::{XmlElement, unescape_xml};
use crate::ooxml::pptx::ids::ShapeId;
use crate::ooxml::pptx::timing::Delay;

/// Behavior elements that can carry a shape target.
const BEHAVIORS: [&str; 8] = [
    "animEffect",
    "set",
    "anim",
    "animClr",
    "animMotion",
    "animRot",
    "animScale",
    "cmd",
];

/// Preset animation effect, identified by its ECMA-376 preset id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationEffect {
    Appear,
    FlyIn,
    Dissolve,
    Fade,
    Split,
    Wipe,
    Zoom,
    /// Any other preset id, or a bare behavior without a preset
    Other(u32),
}

impl AnimationEffect {
    pub fn from_preset_id(id: u32) -> Self {
        match id {
            1 => AnimationEffect::Appear,
            2 => AnimationEffect::FlyIn,
            9 => AnimationEffect::Dissolve,
            10 => AnimationEffect::Fade,
            16 => AnimationEffect::Split,
            22 => AnimationEffect::Wipe,
            23 => AnimationEffect::Zoom,
            other => AnimationEffect::Other(other),
        }
    }

    pub fn preset_id(&self) -> u32 {
        match self {
            AnimationEffect::Appear => 1,
            AnimationEffect::FlyIn => 2,
            AnimationEffect::Dissolve => 9,
            AnimationEffect::Fade => 10,
            AnimationEffect::Split => 16,
            AnimationEffect::Wipe => 22,
            AnimationEffect::Zoom => 23,
            AnimationEffect::Other(id) => *id,
        }
    }

    /// Filter string written on `p:animEffect` when the caller gives none.
    pub fn default_filter(&self) -> &'static str {
        match self {
            AnimationEffect::Dissolve => "dissolve",
            AnimationEffect::Split => "barn(inVertical)",
            AnimationEffect::Wipe => "wipe(down)",
            _ => "fade",
        }
    }
}

/// Direction of a visibility effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    In,
    Out,
}

impl Transition {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "in" => Some(Transition::In),
            "out" => Some(Transition::Out),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transition::In => "in",
            Transition::Out => "out",
        }
    }

    /// Preset class of an effect group with this transition.
    pub fn preset_class(self) -> &'static str {
        match self {
            Transition::In => "entr",
            Transition::Out => "exit",
        }
    }

    fn from_preset_class(class: &str) -> Option<Self> {
        match class {
            "entr" => Some(Transition::In),
            "exit" => Some(Transition::Out),
            _ => None,
        }
    }
}

/// An effect to append under a click trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectSpec {
    pub target: ShapeId,
    pub effect: AnimationEffect,
    pub transition: Transition,
    /// `None` uses [`AnimationEffect::default_filter`]
    pub filter: Option<String>,
    /// `None` uses the editor's default duration
    pub duration_ms: Option<u32>,
    pub delay_ms: u32,
}

impl EffectSpec {
    /// An entrance effect starting as soon as its trigger fires.
    pub fn new(target: ShapeId, effect: AnimationEffect) -> Self {
        Self {
            target,
            effect,
            transition: Transition::In,
            filter: None,
            duration_ms: None,
            delay_ms: 0,
        }
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub(crate) fn filter_or_default(&self) -> &str {
        self.filter
            .as_deref()
            .unwrap_or_else(|| self.effect.default_filter())
    }
}

/// An effect leaf bound to a target shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationBinding {
    pub target: ShapeId,
    pub effect: AnimationEffect,
    /// Local name of the behavior element (`animEffect`, `set`, ...)
    pub behavior: String,
    pub transition: Option<Transition>,
    pub filter: Option<String>,
    /// Raw `dur` token of the behavior's time node
    pub duration: Option<String>,
    pub delay: Delay,
    /// 1-based ordinal of the enclosing main-sequence group
    pub trigger: Option<usize>,
}

impl AnimationBinding {
    /// Every effect leaf of a slide with a well-formed shape target, in
    /// document order.
    pub fn collect(slide_root: &XmlElement) -> Vec<Self> {
        let mut out = Vec::new();
        if let Some(timing) = slide_root.child("timing") {
            let mut path = Vec::new();
            walk(timing, &mut path, &mut out);
        }
        out
    }
}

fn walk<'a>(el: &'a XmlElement, path: &mut Vec<&'a XmlElement>, out: &mut Vec<AnimationBinding>) {
    if BEHAVIORS.contains(&el.local_name())
        && let Some(binding) = binding_from(el, path)
    {
        out.push(binding);
    }
    path.push(el);
    for child in el.elements() {
        walk(child, path, out);
    }
    path.pop();
}

fn binding_from(behavior: &XmlElement, path: &[&XmlElement]) -> Option<AnimationBinding> {
    let cbhvr = behavior.child("cBhvr")?;
    let target = cbhvr
        .child("tgtEl")?
        .child("spTgt")?
        .attr("spid")
        .and_then(ShapeId::parse)?;

    let effect_ctn = path
        .iter()
        .rev()
        .find(|el| el.is("cTn") && el.attr("presetID").is_some());
    let effect = effect_ctn
        .and_then(|ctn| ctn.attr("presetID"))
        .and_then(|id| atoi_simd::parse::<u32, false, false>(id.as_bytes()).ok())
        .map_or(AnimationEffect::Other(0), AnimationEffect::from_preset_id);
    let transition = behavior.attr("transition").and_then(Transition::parse).or_else(|| {
        effect_ctn
            .and_then(|ctn| ctn.attr("presetClass"))
            .and_then(Transition::from_preset_class)
    });

    Some(AnimationBinding {
        target,
        effect,
        behavior: behavior.local_name().to_string(),
        transition,
        filter: behavior.attr("filter").map(unescape_xml),
        duration: cbhvr
            .child("cTn")
            .and_then(|ctn| ctn.attr("dur"))
            .map(str::to_string),
        delay: effect_ctn.map_or(Delay::Millis(0), |ctn| Delay::of_time_node(ctn)),
        trigger: trigger_ordinal(path),
    })
}

/// Ordinal of the main-sequence group on the path, if the path runs through
/// the main sequence.
fn trigger_ordinal(path: &[&XmlElement]) -> Option<usize> {
    let seq_pos = path
        .iter()
        .position(|el| el.is("cTn") && el.attr("nodeType") == Some("mainSeq"))?;
    let list = path.get(seq_pos + 1).filter(|el| el.is("childTnLst"))?;
    let group = path.get(seq_pos + 2)?;
    list.children_named("par")
        .position(|par| std::ptr::eq(par, *group))
        .map(|pos| pos + 1)
}
