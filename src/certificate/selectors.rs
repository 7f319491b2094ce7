//! Annotation Resolver for the mutually exclusive button controls on page 2.
//!
//! Control names are matched against category and option keywords once, when
//! the table is built from the template. Resolution then works from the table:
//! the requested option is switched on and every other control of the
//! category is switched off explicitly.

use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

use super::fields::LogicalPage;
use super::request::CertificateRequest;
use super::template::{
    annotation_ids, inherited_name, resolve, resolve_field, set_dict_entry, WorkingDocument,
};
use super::CertificateError;

const OFF_STATE: &str = "Off";
const DEFAULT_ON_STATE: &str = "Yes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SelectorCategory {
    Refrigeration,
    VehicleClass,
}

impl SelectorCategory {
    pub const ALL: [SelectorCategory; 2] =
        [SelectorCategory::Refrigeration, SelectorCategory::VehicleClass];

    /// Keyword that marks a control as belonging to the category.
    pub fn keyword(&self) -> &'static str {
        match self {
            SelectorCategory::Refrigeration => "sistema_refrigeracion",
            SelectorCategory::VehicleClass => "clase",
        }
    }

    pub fn options(&self) -> &'static [&'static str] {
        match self {
            SelectorCategory::Refrigeration => &["si", "no"],
            SelectorCategory::VehicleClass => &["camion", "camioneta", "moto", "otro"],
        }
    }

    /// Option keyword requested by the form, if the value is recognised.
    pub fn requested_option(&self, request: &CertificateRequest) -> Option<&'static str> {
        match self {
            SelectorCategory::Refrigeration => request.refrigeration_flag().map(|f| f.keyword()),
            SelectorCategory::VehicleClass => request.vehicle_class().map(|c| c.keyword()),
        }
    }

    fn contains(&self, name: &str) -> bool {
        name.to_lowercase().contains(self.keyword())
    }
}

/// Option keyword matched by `label`, honouring specific-before-generic precedence.
///
/// A keyword only matches when no longer sibling keyword containing it is also
/// present, so `camioneta` never satisfies `camion`. Labels matching more than
/// one option are ambiguous and bind to none.
pub fn match_option(label: &str, options: &[&'static str]) -> Option<&'static str> {
    let label = label.to_lowercase();
    let matched: Vec<&'static str> = options
        .iter()
        .copied()
        .filter(|keyword| label.contains(keyword))
        .filter(|keyword| {
            !options.iter().any(|sibling| {
                sibling != keyword && sibling.contains(keyword) && label.contains(sibling)
            })
        })
        .collect();
    match matched.as_slice() {
        [single] => Some(*single),
        _ => None,
    }
}

/// One widget of a button control and the appearance state that means "on".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlWidget {
    pub widget_id: ObjectId,
    pub on_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// A field that is its own widget.
    Checkbox(ControlWidget),
    /// Radio-style parent field whose kids are the options.
    ExclusiveGroup(Vec<ControlWidget>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorControl {
    pub name: String,
    pub field_id: ObjectId,
    pub kind: ControlKind,
}

impl SelectorControl {
    pub fn widgets(&self) -> Vec<&ControlWidget> {
        match &self.kind {
            ControlKind::Checkbox(widget) => vec![widget],
            ControlKind::ExclusiveGroup(widgets) => widgets.iter().collect(),
        }
    }

    /// Text matched against option keywords: the name without the category
    /// keyword, plus the on-state for group options.
    fn option_label(&self, category: SelectorCategory, widget: &ControlWidget) -> String {
        let residual = self.name.to_lowercase().replace(category.keyword(), "");
        match self.kind {
            ControlKind::Checkbox(_) => residual,
            ControlKind::ExclusiveGroup(_) => format!("{residual}_{}", widget.on_state),
        }
    }
}

/// Address of one switchable widget inside the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRef {
    pub control: usize,
    pub widget: usize,
}

/// `(category, option) -> widget` bindings discovered on one page.
///
/// Each option binds to at most one widget. Later widgets matching an option
/// that is already bound are recorded as duplicates and always switched off.
#[derive(Debug, Clone, Default)]
pub struct SelectorTable {
    controls: Vec<SelectorControl>,
    members: BTreeMap<SelectorCategory, Vec<SwitchRef>>,
    bindings: BTreeMap<(SelectorCategory, &'static str), SwitchRef>,
    unbound: Vec<(SelectorCategory, String)>,
    duplicates: Vec<(SelectorCategory, String)>,
}

impl SelectorTable {
    /// Build and validate the table from the button controls on `page`.
    pub fn discover(document: &WorkingDocument, page: LogicalPage) -> Self {
        let mut table = SelectorTable::default();
        let Some(page_id) = document.page_id(page) else {
            return table;
        };
        let doc = document.document();
        table.controls = button_controls(doc, page_id);

        for (control_index, control) in table.controls.iter().enumerate() {
            for category in SelectorCategory::ALL {
                if !category.contains(&control.name) {
                    continue;
                }
                for (widget_index, widget) in control.widgets().into_iter().enumerate() {
                    let switch = SwitchRef {
                        control: control_index,
                        widget: widget_index,
                    };
                    table.members.entry(category).or_default().push(switch);
                    let label = control.option_label(category, widget);
                    match match_option(&label, category.options()) {
                        Some(option) => {
                            if let Some(first) = table.bindings.get(&(category, option)) {
                                log::warn!(
                                    "selector control '{}' duplicates {:?} option '{}' already bound to '{}'; it stays off",
                                    control.name,
                                    category,
                                    option,
                                    table.controls[first.control].name
                                );
                                table.duplicates.push((category, control.name.clone()));
                            } else {
                                table.bindings.insert((category, option), switch);
                            }
                        }
                        None => {
                            log::warn!(
                                "selector control '{}' ({:?}) matches no {:?} option",
                                control.name,
                                widget.on_state,
                                category
                            );
                            table.unbound.push((category, control.name.clone()));
                        }
                    }
                }
            }
        }

        for category in SelectorCategory::ALL {
            for option in category.options() {
                if table.members.contains_key(&category)
                    && !table.bindings.contains_key(&(category, *option))
                {
                    log::warn!("template has no control for {:?} option '{}'", category, option);
                }
            }
        }
        table
    }

    pub fn controls(&self) -> &[SelectorControl] {
        &self.controls
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Name of the control bound to `(category, option)`.
    pub fn bound_control(&self, category: SelectorCategory, option: &str) -> Option<&str> {
        self.binding(category, option)
            .map(|switch| self.controls[switch.control].name.as_str())
    }

    /// Controls of a category that bind to no option.
    pub fn unbound(&self) -> &[(SelectorCategory, String)] {
        &self.unbound
    }

    /// Controls matching an option that an earlier control already holds.
    pub fn duplicates(&self) -> &[(SelectorCategory, String)] {
        &self.duplicates
    }

    fn binding(&self, category: SelectorCategory, option: &str) -> Option<SwitchRef> {
        self.bindings
            .iter()
            .find(|((c, o), _)| *c == category && *o == option)
            .map(|(_, switch)| *switch)
    }

    /// Activate `requested` within `category` and switch everything else off.
    ///
    /// Returns the names of the activated controls (at most one); an empty
    /// list means the whole category ended up off.
    pub fn resolve(
        &self,
        document: &mut WorkingDocument,
        category: SelectorCategory,
        requested: Option<&str>,
    ) -> Result<Vec<String>, CertificateError> {
        let Some(members) = self.members.get(&category) else {
            return Ok(Vec::new());
        };
        let active = requested.and_then(|option| self.binding(category, option));

        let doc = document.document_mut();
        let mut field_values: BTreeMap<usize, String> = BTreeMap::new();
        let mut activated = Vec::new();

        for switch in members {
            let control = &self.controls[switch.control];
            let widget = control.widgets()[switch.widget];
            let state = if active == Some(*switch) {
                activated.push(control.name.clone());
                field_values.insert(switch.control, widget.on_state.clone());
                widget.on_state.as_str()
            } else {
                field_values
                    .entry(switch.control)
                    .or_insert_with(|| OFF_STATE.to_string());
                OFF_STATE
            };
            set_dict_entry(doc, widget.widget_id, "AS", name_object(state))?;
        }

        for (control_index, value) in field_values {
            let field_id = self.controls[control_index].field_id;
            set_dict_entry(doc, field_id, "V", name_object(&value))?;
        }

        if activated.is_empty() {
            log::info!("no {:?} control matches {:?}; category left off", category, requested);
        }
        Ok(activated)
    }
}

/// Resolve every selector category of page 2 for `request`.
pub fn resolve_page(
    document: &mut WorkingDocument,
    request: &CertificateRequest,
) -> Result<BTreeMap<SelectorCategory, Vec<String>>, CertificateError> {
    let table = SelectorTable::discover(document, LogicalPage::Page2);
    let mut resolved = BTreeMap::new();
    for category in SelectorCategory::ALL {
        let activated = table.resolve(document, category, category.requested_option(request))?;
        resolved.insert(category, activated);
    }
    Ok(resolved)
}

fn name_object(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// Button fields on a page, grouped by the field that owns the widgets.
fn button_controls(doc: &Document, page_id: ObjectId) -> Vec<SelectorControl> {
    let mut grouped: BTreeMap<ObjectId, (String, Vec<ControlWidget>, bool)> = BTreeMap::new();
    let mut order: Vec<ObjectId> = Vec::new();

    for widget_id in annotation_ids(doc, page_id) {
        if inherited_name(doc, widget_id, b"FT").as_deref() != Some("Btn") {
            continue;
        }
        let Some(field) = resolve_field(doc, widget_id) else {
            continue;
        };
        let widget = ControlWidget {
            widget_id,
            on_state: on_state(doc, widget_id),
        };
        let own_widget = field.field_id == widget_id;
        let entry = grouped.entry(field.field_id).or_insert_with(|| {
            order.push(field.field_id);
            (field.name.clone(), Vec::new(), own_widget)
        });
        entry.1.push(widget);
    }

    order
        .into_iter()
        .filter_map(|field_id| {
            let (name, mut widgets, own_widget) = grouped.remove(&field_id)?;
            let kind = if own_widget && widgets.len() == 1 {
                ControlKind::Checkbox(widgets.remove(0))
            } else {
                ControlKind::ExclusiveGroup(widgets)
            };
            Some(SelectorControl {
                name,
                field_id,
                kind,
            })
        })
        .collect()
}

/// First non-`Off` key of the widget's normal appearance dictionary.
fn on_state(doc: &Document, widget_id: ObjectId) -> String {
    let state = doc
        .get_dictionary(widget_id)
        .ok()
        .and_then(|widget| widget.get(b"AP").ok())
        .and_then(|ap| resolve(doc, ap).as_dict().ok())
        .and_then(|ap| ap.get(b"N").ok())
        .and_then(|normal| resolve(doc, normal).as_dict().ok())
        .and_then(|normal| {
            normal
                .iter()
                .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
                .find(|key| key != OFF_STATE)
        });
    state.unwrap_or_else(|| DEFAULT_ON_STATE.to_string())
}
