//! Slide timing tree (`p:timing`).
//!
//! The main sequence is a `p:cTn nodeType="mainSeq"` under the root time node.
//! Each direct `p:par` child of the main sequence is a click group: its time
//! node starts on `delay="indefinite"`, i.e. on the next user advance. Effect
//! leaves hang below the click group and start after a numeric delay.
//!
//! Click groups are append-only. Time node ids are unique within one slide
//! and are allocated above the largest id present in that slide.

use crate::common::error::{Error, Result};
use crate::common::xml::{XmlDocument, XmlElement};
use crate::ooxml::pptx::animations::EffectSpec;
use crate::ooxml::pptx::ids::ShapeId;
use tracing::debug;

const INDEFINITE: &str = "indefinite";

/// Start delay of a time node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Wait for the next user advance
    Indefinite,
    Millis(u64),
}

impl Delay {
    /// Parse a `delay` token. Unparseable tokens count as zero.
    pub fn parse(token: &str) -> Self {
        if token == INDEFINITE {
            return Delay::Indefinite;
        }
        Delay::Millis(atoi_simd::parse::<u64, false, false>(token.as_bytes()).unwrap_or(0))
    }

    /// Delay of a `p:cTn` from its first start condition.
    pub fn of_time_node(ctn: &XmlElement) -> Self {
        ctn.child("stCondLst")
            .and_then(|list| list.child("cond"))
            .and_then(|cond| cond.attr("delay"))
            .map_or(Delay::Millis(0), Delay::parse)
    }

    #[inline]
    pub fn is_indefinite(self) -> bool {
        matches!(self, Delay::Indefinite)
    }

    pub fn to_token(self) -> String {
        match self {
            Delay::Indefinite => INDEFINITE.to_string(),
            Delay::Millis(ms) => itoa::Buffer::new().format(ms).to_string(),
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Delay::Millis(0)
    }
}

/// One `p:cTn` with its structural children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimingNode {
    pub id: Option<u32>,
    /// Local name of the container (`par`, `seq`, `animEffect`, ...)
    pub kind: String,
    pub node_type: Option<String>,
    pub duration: Option<String>,
    pub delay: Delay,
    /// Shape targeted by a behavior node
    pub target: Option<ShapeId>,
    pub children: Vec<TimingNode>,
}

impl TimingNode {
    /// Build from a time container (`p:par`, `p:seq`, `p:set`, ...).
    fn from_container(container: &XmlElement) -> Option<Self> {
        let ctn = time_node_of(container)?;
        let target = container
            .child("cBhvr")
            .and_then(|b| b.child("tgtEl"))
            .and_then(|t| t.child("spTgt"))
            .and_then(|sp| sp.attr("spid"))
            .and_then(ShapeId::parse);
        let children = ctn
            .child("childTnLst")
            .map(|list| list.elements().filter_map(TimingNode::from_container).collect())
            .unwrap_or_default();
        Some(Self {
            id: ctn.attr("id").and_then(|id| atoi_simd::parse::<u32, false, false>(id.as_bytes()).ok()),
            kind: container.local_name().to_string(),
            node_type: ctn.attr("nodeType").map(str::to_string),
            duration: ctn.attr("dur").map(str::to_string),
            delay: Delay::of_time_node(ctn),
            target,
            children,
        })
    }

    fn from_time_node(ctn: &XmlElement) -> Self {
        let children = ctn
            .child("childTnLst")
            .map(|list| list.elements().filter_map(TimingNode::from_container).collect())
            .unwrap_or_default();
        Self {
            id: ctn.attr("id").and_then(|id| atoi_simd::parse::<u32, false, false>(id.as_bytes()).ok()),
            kind: "cTn".to_string(),
            node_type: ctn.attr("nodeType").map(str::to_string),
            duration: ctn.attr("dur").map(str::to_string),
            delay: Delay::of_time_node(ctn),
            target: None,
            children,
        }
    }

    /// Pre-order iterator over this node and its descendants.
    pub fn walk(&self) -> Vec<&TimingNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// The time node of a container: its own `p:cTn`, or the one inside
/// `p:cBhvr` / `p:cMediaNode`.
fn time_node_of(container: &XmlElement) -> Option<&XmlElement> {
    container.child("cTn").or_else(|| {
        container
            .child("cBhvr")
            .or_else(|| container.child("cMediaNode"))
            .and_then(|inner| inner.child("cTn"))
    })
}

fn is_main_seq(el: &XmlElement) -> bool {
    el.is("cTn") && el.attr("nodeType") == Some("mainSeq")
}

fn is_tm_root(el: &XmlElement) -> bool {
    el.is("cTn") && el.attr("nodeType") == Some("tmRoot")
}

/// Parsed main sequence of a slide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingTree {
    pub main_sequence: Option<TimingNode>,
}

impl TimingTree {
    pub fn from_slide(slide_root: &XmlElement) -> Self {
        let main_sequence = slide_root
            .child("timing")
            .and_then(|timing| timing.find_where(&is_main_seq))
            .map(TimingNode::from_time_node);
        Self { main_sequence }
    }

    /// Click groups in sequence order.
    pub fn click_triggers(&self) -> &[TimingNode] {
        self.main_sequence
            .as_ref()
            .map_or(&[], |seq| seq.children.as_slice())
    }

    pub fn trigger_count(&self) -> usize {
        self.click_triggers().len()
    }
}

/// Allocator for `p:cTn/@id` values within one slide.
#[derive(Debug, Clone)]
pub struct TimingIdAllocator {
    next: u32,
}

impl TimingIdAllocator {
    /// Start above the largest time node id in the slide.
    pub fn for_slide(slide_root: &XmlElement) -> Self {
        let max = slide_root
            .child("timing")
            .map(|timing| {
                timing
                    .descendants()
                    .into_iter()
                    .filter(|el| el.is("cTn"))
                    .filter_map(|ctn| ctn.attr("id"))
                    .filter_map(|id| atoi_simd::parse::<u32, false, false>(id.as_bytes()).ok())
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        Self {
            next: max.saturating_add(1),
        }
    }

    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    fn allocate_token(&mut self) -> String {
        itoa::Buffer::new().format(self.allocate()).to_string()
    }
}

/// Qualified-name builder in the slide's PresentationML prefix.
struct Pml<'a>(&'a str);

impl Pml<'_> {
    fn el(&self, local: &str) -> XmlElement {
        if self.0.is_empty() {
            XmlElement::new(local)
        } else {
            XmlElement::new(format!("{}:{}", self.0, local))
        }
    }

    fn start_condition(&self, delay: &str) -> XmlElement {
        self.el("stCondLst")
            .with_child(self.el("cond").with_attr("delay", delay))
    }

    fn main_sequence(&self, ids: &mut TimingIdAllocator) -> XmlElement {
        self.el("cTn")
            .with_attr("id", &ids.allocate_token())
            .with_attr("dur", INDEFINITE)
            .with_attr("nodeType", "mainSeq")
            .with_child(self.el("childTnLst"))
    }

    /// `p:timing` holding a root time node and an empty main sequence.
    fn skeleton(&self, ids: &mut TimingIdAllocator) -> XmlElement {
        let root_id = ids.allocate_token();
        let seq = self
            .el("seq")
            .with_attr("concurrent", "1")
            .with_attr("nextAc", "seek")
            .with_child(self.main_sequence(ids))
            .with_child(self.el("prevCondLst").with_child(self.navigation_condition("onPrev")))
            .with_child(self.el("nextCondLst").with_child(self.navigation_condition("onNext")));
        let tm_root = self
            .el("cTn")
            .with_attr("id", &root_id)
            .with_attr("dur", INDEFINITE)
            .with_attr("restart", "never")
            .with_attr("nodeType", "tmRoot")
            .with_child(self.el("childTnLst").with_child(seq));
        self.el("timing")
            .with_child(self.el("tnLst").with_child(self.el("par").with_child(tm_root)))
    }

    fn navigation_condition(&self, event: &str) -> XmlElement {
        self.el("cond")
            .with_attr("evt", event)
            .with_attr("delay", "0")
            .with_child(self.el("tgtEl").with_child(self.el("sldTgt")))
    }

    fn click_group(&self, ids: &mut TimingIdAllocator) -> XmlElement {
        self.el("par").with_child(
            self.el("cTn")
                .with_attr("id", &ids.allocate_token())
                .with_attr("fill", "hold")
                .with_child(self.start_condition(INDEFINITE))
                .with_child(self.el("childTnLst")),
        )
    }

    fn effect(
        &self,
        spec: &EffectSpec,
        duration_ms: u32,
        effect_id: &str,
        behavior_id: &str,
    ) -> XmlElement {
        let mut buf = itoa::Buffer::new();
        let behavior = self
            .el("cBhvr")
            .with_child(
                self.el("cTn")
                    .with_attr("id", behavior_id)
                    .with_attr("dur", buf.format(duration_ms)),
            )
            .with_child(
                self.el("tgtEl").with_child(
                    self.el("spTgt")
                        .with_attr("spid", &spec.target.to_string()),
                ),
            );
        let anim = self
            .el("animEffect")
            .with_attr("transition", spec.transition.as_str())
            .with_attr("filter", spec.filter_or_default())
            .with_child(behavior);

        let mut buf = itoa::Buffer::new();
        let delay = buf.format(spec.delay_ms).to_string();
        let mut preset = itoa::Buffer::new();
        self.el("par").with_child(
            self.el("cTn")
                .with_attr("id", effect_id)
                .with_attr("presetID", preset.format(spec.effect.preset_id()))
                .with_attr("presetClass", spec.transition.preset_class())
                .with_attr("presetSubtype", "0")
                .with_attr("fill", "hold")
                .with_attr("nodeType", "clickEffect")
                .with_child(self.start_condition(&delay))
                .with_child(self.el("childTnLst").with_child(anim)),
        )
    }
}

/// Main-sequence time node of the slide, creating the timing skeleton or the
/// main sequence as needed.
fn ensure_main_sequence<'a>(
    root: &'a mut XmlElement,
    pml: &Pml<'_>,
    ids: &mut TimingIdAllocator,
) -> Result<&'a mut XmlElement> {
    if root.child("timing").is_none() {
        // p:timing precedes p:extLst in a slide
        let index = root.child_index("extLst").unwrap_or(root.children().len());
        root.insert_child(index, pml.skeleton(ids));
        debug!("Created timing tree");
    }
    let timing = root
        .child_mut("timing")
        .ok_or_else(|| Error::Structural("slide has no timing element".to_string()))?;
    if timing.find_where(&is_main_seq).is_none() {
        let main_seq = pml.main_sequence(ids);
        let tm_root = timing
            .find_where_mut(&is_tm_root)
            .ok_or_else(|| Error::Structural("timing tree has no root time node".to_string()))?;
        let list = tm_root.ensure_child("childTnLst");
        list.push_child(
            XmlElement::new(list.qualified("seq"))
                .with_attr("concurrent", "1")
                .with_attr("nextAc", "seek")
                .with_child(main_seq),
        );
    }
    timing
        .find_where_mut(&is_main_seq)
        .ok_or_else(|| Error::Structural("timing tree has no main sequence".to_string()))
}

fn slide_prefix(doc: &XmlDocument) -> String {
    doc.root().prefix().unwrap_or_default().to_string()
}

/// Append a click group to the main sequence.
///
/// # Returns
/// The 1-based ordinal of the new group, i.e. the previous group count + 1.
pub fn create_click_trigger(doc: &mut XmlDocument) -> Result<usize> {
    let prefix = slide_prefix(doc);
    let pml = Pml(&prefix);
    let mut ids = TimingIdAllocator::for_slide(doc.root());

    let main_seq = ensure_main_sequence(doc.root_mut(), &pml, &mut ids)?;
    let list = main_seq.ensure_child("childTnLst");
    let ordinal = list.children_named("par").count() + 1;
    list.push_child(pml.click_group(&mut ids));
    debug!("Appended click trigger {}", ordinal);
    Ok(ordinal)
}

/// Append an effect leaf under the click group with the given ordinal.
///
/// # Arguments
/// * `trigger` - 1-based click group ordinal
/// * `spec` - Effect to append
/// * `default_duration_ms` - Used when `spec` carries no duration
///
/// # Returns
/// The time node id of the new effect group.
pub fn bind_effect(
    doc: &mut XmlDocument,
    trigger: usize,
    spec: &EffectSpec,
    default_duration_ms: u32,
) -> Result<u32> {
    let prefix = slide_prefix(doc);
    let pml = Pml(&prefix);
    let mut ids = TimingIdAllocator::for_slide(doc.root());

    let list = doc
        .root_mut()
        .child_mut("timing")
        .and_then(|timing| timing.find_where_mut(&is_main_seq))
        .and_then(|seq| seq.child_mut("childTnLst"))
        .ok_or_else(|| Error::NotFound(format!("click trigger {trigger}: slide has no main sequence")))?;
    let count = list.children_named("par").count();
    if trigger == 0 || trigger > count {
        return Err(Error::NotFound(format!(
            "click trigger {trigger} (slide has {count})"
        )));
    }
    let group = list
        .elements_mut()
        .filter(|el| el.is("par"))
        .nth(trigger - 1)
        .and_then(|par| par.child_mut("cTn"))
        .ok_or_else(|| Error::Structural(format!("click trigger {trigger} has no time node")))?;

    let effect_id = ids.allocate();
    let behavior_id = ids.allocate();
    let mut a = itoa::Buffer::new();
    let mut b = itoa::Buffer::new();
    let effect = pml.effect(
        spec,
        spec.duration_ms.unwrap_or(default_duration_ms),
        a.format(effect_id),
        b.format(behavior_id),
    );
    group.ensure_child("childTnLst").push_child(effect);
    debug!("Bound effect {} to shape {} under trigger {}", effect_id, spec.target, trigger);
    Ok(effect_id)
}

/// Time nodes that break the click-trigger delay rule, as
/// `(time node id, description)`.
///
/// Direct click groups of the main sequence must start on `indefinite`;
/// nothing deeper inside the main sequence may.
pub fn trigger_delay_violations(slide_root: &XmlElement) -> Vec<(Option<u32>, String)> {
    let tree = TimingTree::from_slide(slide_root);
    let mut out = Vec::new();
    for (ordinal, group) in tree.click_triggers().iter().enumerate() {
        if !group.delay.is_indefinite() {
            out.push((
                group.id,
                format!("click group {} does not wait for a click", ordinal + 1),
            ));
        }
        for node in group.children.iter().flat_map(TimingNode::walk) {
            if node.delay.is_indefinite() {
                out.push((node.id, "nested time node waits for a click".to_string()));
            }
        }
    }
    out
}
