use std::path::PathBuf;

use ahash::{HashMap, HashMapExt};
use angle_name::{Name, XSLT_NAMESPACE};
use angle_xml::{Forest, Node, NodeKind, ParseOptions, PiHandlers, Value};
use angle_xpath::{
    parse, Atomic, Cancellation, CompileOptions, Context, Environment, Evaluator, FunctionGroup,
    GroupState, Item, MapKey, Sequence,
};

use crate::avt::Avt;
use crate::error::{Error, Result};
use crate::output::OutputSpec;
use crate::stylesheet::{
    required_attribute, xsl_local, NoMatchPolicy, ParamDecl, Resolver, Stylesheet, Template,
};

/// Output captured by `xsl:result-document`, rendered at instruction exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDocument {
    pub href: String,
    pub content: String,
}

/// Drives one transformation run: template dispatch by pattern, one handler
/// per instruction, scoped variables and AVT expansion.
pub struct Transformer<'a> {
    forest: &'a mut Forest,
    stylesheet: &'a Stylesheet,
    env: Environment,
    resolver: Option<&'a Resolver<'a>>,
    trace: Option<Box<dyn FnMut(&str) + 'a>>,
    parameters: HashMap<Name, Sequence>,
    /// Secondary outputs in creation order.
    pub result_documents: Vec<ResultDocument>,
    write_files: bool,
    output_dir: Option<PathBuf>,
    /// Per-run clones of the template bodies; the loaded stylesheet stays
    /// pristine.
    template_bodies: Vec<Vec<Node>>,
    /// (mode, precedence) of the active template, for apply-imports.
    match_stack: Vec<(Option<String>, usize)>,
    initial_mode: Option<String>,
}

impl<'a> Transformer<'a> {
    pub fn new(forest: &'a mut Forest, stylesheet: &'a Stylesheet) -> Self {
        let mut env = Environment::new();
        env.namespaces = stylesheet.namespaces.clone();
        Transformer {
            forest,
            stylesheet,
            env,
            resolver: None,
            trace: None,
            parameters: HashMap::new(),
            result_documents: Vec::new(),
            write_files: false,
            output_dir: None,
            template_bodies: Vec::new(),
            match_stack: Vec::new(),
            initial_mode: None,
        }
    }

    /// Start the run in a named mode instead of the default one.
    pub fn with_initial_mode(mut self, mode: Option<String>) -> Self {
        self.initial_mode = mode;
        self
    }

    /// Loader for `xsl:source-document` hrefs.
    pub fn with_resolver(mut self, resolver: &'a Resolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sink for `xsl:message`.
    pub fn with_trace(mut self, trace: Box<dyn FnMut(&str) + 'a>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.env.cancellation = cancellation;
        self
    }

    /// Override a global stylesheet parameter.
    pub fn with_parameter(mut self, name: Name, value: Sequence) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Enable an opt-in function group and bind its conventional prefix.
    pub fn with_function_group(mut self, group: FunctionGroup) -> Self {
        self.env.functions.enable(group);
        self.env.namespaces.add(group.prefix(), group.uri());
        self
    }

    /// Write `xsl:result-document` outputs under this directory.
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.write_files = true;
        self.output_dir = Some(dir);
        self
    }

    /// Run the stylesheet against a source node, producing the result
    /// document node.
    pub fn transform(&mut self, source: Node) -> Result<Node> {
        // execution walks per-run clones of the template bodies
        let sheet = self.stylesheet;
        let mut bodies = Vec::with_capacity(sheet.templates.len());
        for template in &sheet.templates {
            let mut body = Vec::with_capacity(template.body.len());
            for &node in &template.body {
                body.push(self.forest.clone_node(node));
            }
            bodies.push(body);
        }
        self.template_bodies = bodies;

        let context = Context::new(Item::Node(source));
        for param in &sheet.params {
            let value = match self.parameters.get(&param.name) {
                Some(value) => value.clone(),
                None => self.param_default(param, &context)?,
            };
            self.env.define(param.name.clone(), value);
        }
        for variable in &sheet.variables {
            let value = self.param_default(variable, &context)?;
            self.env.define(variable.name.clone(), value);
        }

        let result = self.forest.new_document();
        let mode = self.initial_mode.clone();
        self.apply_templates(vec![Item::Node(source)], mode.as_deref(), &[], result)?;
        Ok(result)
    }

    /// Render the result per the unnamed `xsl:output` declaration.
    pub fn render(&self, result: Node) -> String {
        self.stylesheet.output(None).render(self.forest, result)
    }

    // --- template dispatch

    fn apply_templates(
        &mut self,
        selection: Vec<Item>,
        mode: Option<&str>,
        with_params: &[(Name, Sequence)],
        output: Node,
    ) -> Result<()> {
        let size = selection.len();
        for (index, item) in selection.into_iter().enumerate() {
            self.env.cancellation.check()?;
            let context = Context::with_focus(item.clone(), index + 1, size);
            match item {
                Item::Node(node) => {
                    self.apply_one(node, &context, mode, with_params, output, 0)?;
                }
                Item::Atomic(atomic) => {
                    // atomic items fall through to their string value
                    self.emit_text(output, &atomic.string_value());
                }
            }
        }
        Ok(())
    }

    fn apply_one(
        &mut self,
        node: Node,
        context: &Context,
        mode: Option<&str>,
        with_params: &[(Name, Sequence)],
        output: Node,
        min_precedence: usize,
    ) -> Result<()> {
        match self.find_template(node, mode, min_precedence)? {
            Some(index) => self.activate(index, context, mode, with_params, output),
            None => self.no_match(node, context, mode, output),
        }
    }

    /// Best match: highest effective priority (pattern depth plus declared
    /// priority), then strongest import precedence, then the latest
    /// declaration.
    fn find_template(
        &mut self,
        node: Node,
        mode: Option<&str>,
        min_precedence: usize,
    ) -> Result<Option<usize>> {
        let sheet = self.stylesheet;
        let mut best: Option<(f64, usize, usize, usize)> = None;
        let mut tied = false;
        for (index, template) in sheet.templates.iter().enumerate() {
            if template.precedence < min_precedence {
                continue;
            }
            if template.mode.as_deref() != mode {
                continue;
            }
            let Some(pattern) = &template.pattern else {
                continue;
            };
            let mut evaluator = Evaluator::new(self.forest, &mut self.env);
            let Some(depth) = pattern.matches(&mut evaluator, node)? else {
                continue;
            };
            let priority = pattern.effective_priority(depth);
            let candidate = (priority, template.precedence, template.order, index);
            match &best {
                None => best = Some(candidate),
                Some(current) => {
                    if priority > current.0 {
                        best = Some(candidate);
                        tied = false;
                    } else if priority == current.0 {
                        if template.precedence < current.1 {
                            best = Some(candidate);
                            tied = false;
                        } else if template.precedence == current.1 {
                            // later declarations win recoverably
                            tied = true;
                            if template.order > current.2 {
                                best = Some(candidate);
                            }
                        }
                    }
                }
            }
        }
        if tied && sheet.mode(mode).fail_on_multiple_match {
            return Err(Error::Load(format!(
                "more than one template matches {}",
                self.forest.path(node)
            )));
        }
        Ok(best.map(|(_, _, _, index)| index))
    }

    fn activate(
        &mut self,
        index: usize,
        context: &Context,
        mode: Option<&str>,
        with_params: &[(Name, Sequence)],
        output: Node,
    ) -> Result<()> {
        self.env.cancellation.check()?;
        let sheet = self.stylesheet;
        let template: &Template = &sheet.templates[index];
        let body = self.template_bodies[index].clone();

        // defaults are evaluated before the template scope opens
        let mut bindings: Vec<(Name, Sequence)> = Vec::new();
        for param in &template.params {
            let value = match with_params.iter().find(|(name, _)| name == &param.name) {
                Some((_, value)) => value.clone(),
                None => self.param_default(param, context)?,
            };
            bindings.push((param.name.clone(), value));
        }

        self.env.push_scope();
        for (name, value) in bindings {
            self.env.define(name, value);
        }
        self.match_stack
            .push((mode.map(|s| s.to_string()), template.precedence));
        let outcome = self.instantiate_body(&body, context, output);
        self.match_stack.pop();
        self.env.pop_scope();
        outcome
    }

    /// The mode's no-match policy.
    fn no_match(
        &mut self,
        node: Node,
        context: &Context,
        mode: Option<&str>,
        output: Node,
    ) -> Result<()> {
        let policy = self.stylesheet.mode(mode).on_no_match;
        match policy {
            NoMatchPolicy::TextOnlyCopy => match self.forest.kind(node) {
                NodeKind::Document | NodeKind::Element => {
                    let children: Vec<Item> =
                        self.forest.children(node).iter().copied().map(Item::Node).collect();
                    self.apply_templates(children, mode, &[], output)
                }
                NodeKind::Text | NodeKind::Cdata | NodeKind::Attribute => {
                    let text = self.forest.string_value(node);
                    self.emit_text(output, &text);
                    Ok(())
                }
                _ => Ok(()),
            },
            NoMatchPolicy::ShallowCopy => {
                let target = self.shallow_copy(node, output)?;
                let children: Vec<Item> =
                    self.forest.children(node).iter().copied().map(Item::Node).collect();
                self.apply_templates(children, mode, &[], target)
            }
            NoMatchPolicy::DeepCopy => {
                let clone = self.forest.clone_node(node);
                self.forest.append_child(output, clone);
                Ok(())
            }
            NoMatchPolicy::ShallowSkip => {
                let children: Vec<Item> =
                    self.forest.children(node).iter().copied().map(Item::Node).collect();
                self.apply_templates(children, mode, &[], output)
            }
            NoMatchPolicy::DeepSkip => Ok(()),
            NoMatchPolicy::Fail => Err(Error::Load(format!(
                "no template matches {}",
                self.forest.path(node)
            ))),
        }
    }

    // --- instruction dispatch

    fn instantiate_body(&mut self, body: &[Node], context: &Context, output: Node) -> Result<()> {
        for &node in body {
            self.env.cancellation.check()?;
            match self.forest.value(node) {
                Value::Element(_) => match xsl_local(self.forest, node) {
                    Some(local) => self.instruction(&local, node, context, output)?,
                    None => self.literal_element(node, context, output)?,
                },
                Value::Text(text) => {
                    // whitespace-only stylesheet text is formatting
                    let content = text.get().to_string();
                    if !content.trim().is_empty() {
                        self.emit_text(output, &content);
                    }
                }
                Value::Cdata(text) => {
                    let content = text.get().to_string();
                    self.emit_text(output, &content);
                }
                // stylesheet comments and processing instructions are not output
                _ => {}
            }
        }
        Ok(())
    }

    fn instruction(
        &mut self,
        local: &str,
        element: Node,
        context: &Context,
        output: Node,
    ) -> Result<()> {
        match local {
            "apply-templates" => self.xsl_apply_templates(element, context, output),
            "apply-imports" => self.xsl_apply_imports(element, context, output),
            "call-template" => self.xsl_call_template(element, context, output),
            "for-each" => self.xsl_for_each(element, context, output),
            "for-each-group" => self.xsl_for_each_group(element, context, output),
            "merge" => self.xsl_merge(element, context, output),
            "choose" => self.xsl_choose(element, context, output),
            "if" => self.xsl_if(element, context, output),
            "variable" | "param" => self.xsl_variable(element, context),
            "value-of" => self.xsl_value_of(element, context, output),
            "copy-of" => self.xsl_copy_of(element, context, output),
            "copy" => self.xsl_copy(element, context, output),
            "sequence" => self.xsl_sequence(element, context, output),
            "element" => self.xsl_element(element, context, output),
            "attribute" => self.xsl_attribute(element, context, output),
            "text" => {
                let content = self.forest.string_value(element);
                self.emit_text(output, &content);
                Ok(())
            }
            "comment" => self.xsl_comment(element, context, output),
            "processing-instruction" => self.xsl_pi(element, context, output),
            "message" => self.xsl_message(element, context),
            "result-document" => self.xsl_result_document(element, context),
            "source-document" => self.xsl_source_document(element, context, output),
            "try" => self.xsl_try(element, context, output),
            "fallback" => Ok(()),
            other => Err(Error::Load(format!("unknown instruction xsl:{}", other))),
        }
    }

    // --- individual instructions

    fn xsl_apply_templates(
        &mut self,
        element: Node,
        context: &Context,
        output: Node,
    ) -> Result<()> {
        let mode = self
            .forest
            .attribute_str(element, "mode")
            .filter(|m| *m != "#default")
            .map(|s| s.to_string());
        let mut selection: Vec<Item> = match self.forest.attribute_str(element, "select") {
            Some(select) => {
                let select = select.to_string();
                self.xpath(&select, context)?.into_iter().collect()
            }
            None => {
                let node = context.node()?;
                self.forest
                    .children(node)
                    .iter()
                    .copied()
                    .map(Item::Node)
                    .collect()
            }
        };
        self.sort_items(&mut selection, element)?;
        let with_params = self.collect_with_params(element, context)?;
        self.apply_templates(selection, mode.as_deref(), &with_params, output)
    }

    fn xsl_apply_imports(
        &mut self,
        element: Node,
        context: &Context,
        output: Node,
    ) -> Result<()> {
        let (mode, precedence) = self
            .match_stack
            .last()
            .cloned()
            .ok_or_else(|| Error::Load("apply-imports outside a template".to_string()))?;
        let node = context.node()?;
        let with_params = self.collect_with_params(element, context)?;
        match self.find_template(node, mode.as_deref(), precedence + 1)? {
            Some(index) => self.activate(index, context, mode.as_deref(), &with_params, output),
            None => self.no_match(node, context, mode.as_deref(), output),
        }
    }

    fn xsl_call_template(
        &mut self,
        element: Node,
        context: &Context,
        output: Node,
    ) -> Result<()> {
        let name = required_attribute(self.forest, element, "name")?;
        let sheet = self.stylesheet;
        let index = sheet
            .templates
            .iter()
            .enumerate()
            .filter(|(_, template)| template.name.as_deref() == Some(name.as_str()))
            .min_by_key(|(_, template)| template.precedence)
            .map(|(index, _)| index)
            .ok_or_else(|| Error::Load(format!("no template named {:?}", name)))?;
        let with_params = self.collect_with_params(element, context)?;
        let mode = self.match_stack.last().and_then(|(mode, _)| mode.clone());
        self.activate(index, context, mode.as_deref(), &with_params, output)
    }

    fn xsl_for_each(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let select = required_attribute(self.forest, element, "select")?;
        let mut items: Vec<Item> = self.xpath(&select, context)?.into_iter().collect();
        self.sort_items(&mut items, element)?;
        let body: Vec<Node> = self
            .forest
            .children(element)
            .iter()
            .copied()
            .filter(|&child| xsl_local(self.forest, child).as_deref() != Some("sort"))
            .collect();
        let size = items.len();
        for (index, item) in items.into_iter().enumerate() {
            self.env.cancellation.check()?;
            let item_context = Context::with_focus(item, index + 1, size);
            self.env.push_scope();
            let outcome = self.instantiate_body(&body, &item_context, output);
            self.env.pop_scope();
            outcome?;
        }
        Ok(())
    }

    fn xsl_for_each_group(
        &mut self,
        element: Node,
        context: &Context,
        output: Node,
    ) -> Result<()> {
        let select = required_attribute(self.forest, element, "select")?;
        let group_by = required_attribute(self.forest, element, "group-by")?;
        let items: Vec<Item> = self.xpath(&select, context)?.into_iter().collect();

        // groups in order of first occurrence of their key
        let mut order: Vec<MapKey> = Vec::new();
        let mut groups: HashMap<MapKey, (Atomic, Vec<Item>)> = HashMap::new();
        let size = items.len();
        for (index, item) in items.into_iter().enumerate() {
            self.env.cancellation.check()?;
            let item_context = Context::with_focus(item.clone(), index + 1, size);
            let key_sequence = self.xpath(&group_by, &item_context)?;
            let key_atomic = key_sequence
                .atomized(self.forest)
                .into_iter()
                .next()
                .unwrap_or_else(|| Atomic::from(""));
            let key = key_atomic.map_key();
            match groups.get_mut(&key) {
                Some((_, members)) => members.push(item),
                None => {
                    order.push(key.clone());
                    groups.insert(key, (key_atomic, vec![item]));
                }
            }
        }

        let body: Vec<Node> = self
            .forest
            .children(element)
            .iter()
            .copied()
            .filter(|&child| xsl_local(self.forest, child).as_deref() != Some("sort"))
            .collect();
        let group_count = order.len();
        for (index, key) in order.into_iter().enumerate() {
            let (key_atomic, members) = groups.remove(&key).expect("group recorded");
            let first = members[0].clone();
            self.env.push_group(GroupState {
                current_group: members.into_iter().collect(),
                current_grouping_key: Some(key_atomic),
                merge_groups: HashMap::new(),
                current_merge_key: None,
                is_merge: false,
            });
            self.env.push_scope();
            let group_context = Context::with_focus(first, index + 1, group_count);
            let outcome = self.instantiate_body(&body, &group_context, output);
            self.env.pop_scope();
            self.env.pop_group();
            outcome?;
        }
        Ok(())
    }

    fn xsl_merge(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        struct Source {
            name: String,
            items: Vec<(Atomic, Item)>,
        }

        let mut sources: Vec<Source> = Vec::new();
        let mut action: Option<Vec<Node>> = None;
        for &child in &self.forest.children(element).to_vec() {
            match xsl_local(self.forest, child).as_deref() {
                Some("merge-source") => {
                    let select = required_attribute(self.forest, child, "select")?;
                    let name = self
                        .forest
                        .attribute_str(child, "name")
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("source-{}", sources.len() + 1));
                    let key_element = self
                        .forest
                        .children(child)
                        .iter()
                        .copied()
                        .find(|&k| xsl_local(self.forest, k).as_deref() == Some("merge-key"))
                        .ok_or_else(|| {
                            Error::Load("merge-source needs a merge-key".to_string())
                        })?;
                    let key_select = required_attribute(self.forest, key_element, "select")?;
                    let items: Vec<Item> = self.xpath(&select, context)?.into_iter().collect();
                    let size = items.len();
                    let mut keyed = Vec::with_capacity(size);
                    for (index, item) in items.into_iter().enumerate() {
                        let item_context = Context::with_focus(item.clone(), index + 1, size);
                        let key = self
                            .xpath(&key_select, &item_context)?
                            .atomized_one(self.forest)?;
                        keyed.push((key, item));
                    }
                    sources.push(Source { name, items: keyed });
                }
                Some("merge-action") => {
                    action = Some(self.forest.children(child).to_vec());
                }
                _ => {}
            }
        }
        let action =
            action.ok_or_else(|| Error::Load("merge needs a merge-action".to_string()))?;

        // visit groups in ascending key order, stable across equal keys by
        // source declaration order
        let mut keys: Vec<Atomic> = Vec::new();
        for source in &sources {
            for (key, _) in &source.items {
                if !keys.iter().any(|k| k.map_key() == key.map_key()) {
                    keys.push(key.clone());
                }
            }
        }
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                let ordering = angle_xpath::compare_atomics(&keys[j], &keys[i])?;
                if ordering == Some(std::cmp::Ordering::Less) {
                    keys.swap(i, j);
                }
            }
        }

        let group_count = keys.len();
        for (index, key) in keys.into_iter().enumerate() {
            self.env.cancellation.check()?;
            let wanted = key.map_key();
            let mut merged: Vec<Item> = Vec::new();
            let mut per_source: HashMap<String, Sequence> = HashMap::new();
            for source in &sources {
                let members: Vec<Item> = source
                    .items
                    .iter()
                    .filter(|(k, _)| k.map_key() == wanted)
                    .map(|(_, item)| item.clone())
                    .collect();
                if !members.is_empty() {
                    per_source.insert(source.name.clone(), members.clone().into_iter().collect());
                    merged.extend(members);
                }
            }
            let first = merged[0].clone();
            self.env.push_group(GroupState {
                current_group: merged.into_iter().collect(),
                current_grouping_key: None,
                merge_groups: per_source,
                current_merge_key: Some(key),
                is_merge: true,
            });
            self.env.push_scope();
            let group_context = Context::with_focus(first, index + 1, group_count);
            let outcome = self.instantiate_body(&action, &group_context, output);
            self.env.pop_scope();
            self.env.pop_group();
            outcome?;
        }
        Ok(())
    }

    fn xsl_choose(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        for &child in &self.forest.children(element).to_vec() {
            match xsl_local(self.forest, child).as_deref() {
                Some("when") => {
                    let test = required_attribute(self.forest, child, "test")?;
                    let holds = self
                        .xpath(&test, context)?
                        .effective_boolean_value()?;
                    if holds {
                        let body = self.forest.children(child).to_vec();
                        return self.instantiate_body(&body, context, output);
                    }
                }
                Some("otherwise") => {
                    let body = self.forest.children(child).to_vec();
                    return self.instantiate_body(&body, context, output);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn xsl_if(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let test = required_attribute(self.forest, element, "test")?;
        let holds = self
            .xpath(&test, context)?
            .effective_boolean_value()?;
        if holds {
            let body = self.forest.children(element).to_vec();
            self.instantiate_body(&body, context, output)?;
        }
        Ok(())
    }

    /// `xsl:variable` in a body binds in the current scope; `xsl:param` at
    /// this position behaves the same once its default has been applied.
    fn xsl_variable(&mut self, element: Node, context: &Context) -> Result<()> {
        let name_text = required_attribute(self.forest, element, "name")?;
        let name = self.lexical_name(&name_text);
        if xsl_local(self.forest, element).as_deref() == Some("param")
            && self.env.is_defined(&name)
        {
            // an overriding with-param already bound it
            return Ok(());
        }
        let value = self.binding_value(element, context)?;
        self.env.define(name, value);
        Ok(())
    }

    fn xsl_value_of(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let separator = self
            .forest
            .attribute_str(element, "separator")
            .unwrap_or(" ")
            .to_string();
        let text = match self.forest.attribute_str(element, "select") {
            Some(select) => {
                let select = select.to_string();
                let value = self.xpath(&select, context)?;
                value.string_join(self.forest, &separator)
            }
            None => {
                let fragment = self.body_fragment(element, context)?;
                self.forest.string_value(fragment)
            }
        };
        if !text.is_empty() {
            self.emit_text(output, &text);
        }
        Ok(())
    }

    fn xsl_copy_of(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let select = required_attribute(self.forest, element, "select")?;
        let value = self.xpath(&select, context)?;
        for item in value.into_iter() {
            match item {
                Item::Node(node) => {
                    if self.forest.kind(node) == NodeKind::Document {
                        // copying a document splices its children
                        for child in self.forest.children(node).to_vec() {
                            let clone = self.forest.clone_node(child);
                            self.forest.append_child(output, clone);
                        }
                    } else if self.forest.kind(node) == NodeKind::Attribute {
                        self.copy_attribute(node, output)?;
                    } else {
                        let clone = self.forest.clone_node(node);
                        self.forest.append_child(output, clone);
                    }
                }
                Item::Atomic(atomic) => self.emit_text(output, &atomic.string_value()),
            }
        }
        Ok(())
    }

    fn xsl_copy(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let node = context.node()?;
        let target = self.shallow_copy(node, output)?;
        self.apply_attribute_sets(element, context, target)?;
        let body = self.forest.children(element).to_vec();
        self.instantiate_body(&body, context, target)
    }

    fn xsl_sequence(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let select = required_attribute(self.forest, element, "select")?;
        let value = self.xpath(&select, context)?;
        self.emit_sequence(value, output)
    }

    fn xsl_element(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let name_avt = required_attribute(self.forest, element, "name")?;
        let name_text = self.expand_avt(&name_avt, context)?;
        let name = self.lexical_name(&name_text);
        let created = self.forest.new_element(name);
        self.forest.append_child(output, created);
        self.apply_attribute_sets(element, context, created)?;
        let body = self.forest.children(element).to_vec();
        self.instantiate_body(&body, context, created)
    }

    fn xsl_attribute(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        if self.forest.kind(output) != NodeKind::Element {
            return Err(Error::Load(
                "xsl:attribute needs an element to attach to".to_string(),
            ));
        }
        let name_avt = required_attribute(self.forest, element, "name")?;
        let name_text = self.expand_avt(&name_avt, context)?;
        let name = self.lexical_name(&name_text);
        let value = match self.forest.attribute_str(element, "select") {
            Some(select) => {
                let select = select.to_string();
                self.xpath(&select, context)?.string_join(self.forest, " ")
            }
            None => {
                let fragment = self.body_fragment(element, context)?;
                self.forest.string_value(fragment)
            }
        };
        self.forest.set_attribute(output, name, value);
        Ok(())
    }

    fn xsl_comment(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let fragment = self.body_fragment(element, context)?;
        let content = self.forest.string_value(fragment);
        let comment = self.forest.new_comment(content);
        self.forest.append_child(output, comment);
        Ok(())
    }

    fn xsl_pi(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let name_avt = required_attribute(self.forest, element, "name")?;
        let name = self.expand_avt(&name_avt, context)?;
        let fragment = self.body_fragment(element, context)?;
        let data = self.forest.string_value(fragment);
        let pi = self.forest.new_processing_instruction(name, data, Vec::new());
        self.forest.append_child(output, pi);
        Ok(())
    }

    fn xsl_message(&mut self, element: Node, context: &Context) -> Result<()> {
        let text = match self.forest.attribute_str(element, "select") {
            Some(select) => {
                let select = select.to_string();
                self.xpath(&select, context)?.string_join(self.forest, " ")
            }
            None => {
                let fragment = self.body_fragment(element, context)?;
                self.forest.string_value(fragment)
            }
        };
        if let Some(trace) = &mut self.trace {
            trace(&text);
        }
        if self.forest.attribute_str(element, "terminate") == Some("yes") {
            return Err(Error::Terminate(text));
        }
        Ok(())
    }

    /// The body renders into a fresh document which is serialized with the
    /// named output format and written only once the instruction completes.
    fn xsl_result_document(&mut self, element: Node, context: &Context) -> Result<()> {
        let href_avt = required_attribute(self.forest, element, "href")?;
        let href = self.expand_avt(&href_avt, context)?;
        let format = self.forest.attribute_str(element, "format").map(|s| s.to_string());

        let doc = self.forest.new_document();
        let body = self.forest.children(element).to_vec();
        self.instantiate_body(&body, context, doc)?;

        let spec: OutputSpec = self.stylesheet.output(format.as_deref());
        let content = spec.render(self.forest, doc);
        if self.write_files {
            let path = match &self.output_dir {
                Some(dir) => dir.join(&href),
                None => PathBuf::from(&href),
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &content)?;
        }
        self.result_documents.push(ResultDocument { href, content });
        Ok(())
    }

    fn xsl_source_document(
        &mut self,
        element: Node,
        context: &Context,
        output: Node,
    ) -> Result<()> {
        let href_avt = required_attribute(self.forest, element, "href")?;
        let href = self.expand_avt(&href_avt, context)?;
        let resolver = self
            .resolver
            .ok_or_else(|| Error::Load("no resolver configured for source-document".to_string()))?;
        let text = resolver(&href)?;
        let doc = self
            .forest
            .parse_with(&text, &ParseOptions::default(), &PiHandlers::new())?;
        let body = self.forest.children(element).to_vec();
        let doc_context = Context::new(Item::Node(doc));
        self.instantiate_body(&body, &doc_context, output)
    }

    /// The body renders into a buffer that only reaches the real output on
    /// success; a recoverable error diverts to the catch branch.
    fn xsl_try(&mut self, element: Node, context: &Context, output: Node) -> Result<()> {
        let children = self.forest.children(element).to_vec();
        let body: Vec<Node> = children
            .iter()
            .copied()
            .filter(|&child| xsl_local(self.forest, child).as_deref() != Some("catch"))
            .collect();
        let catch = children
            .iter()
            .copied()
            .filter(|&child| xsl_local(self.forest, child).as_deref() == Some("catch"))
            .next_back();

        let buffer = self.forest.new_document();
        match self.instantiate_body(&body, context, buffer) {
            Ok(()) => {
                self.move_children(buffer, output);
                Ok(())
            }
            Err(err) if err.is_recoverable() => match catch {
                Some(catch) => {
                    let catch_body = self.forest.children(catch).to_vec();
                    self.instantiate_body(&catch_body, context, output)
                }
                None => Ok(()),
            },
            Err(err) => Err(err),
        }
    }

    // --- literal result content

    fn literal_element(&mut self, node: Node, context: &Context, output: Node) -> Result<()> {
        let name = self
            .forest
            .name(node)
            .expect("literal element has a name")
            .clone();
        let created = self.forest.new_element(name);
        self.forest.append_child(output, created);

        let attributes = self.forest.attributes(node).to_vec();
        for attribute in attributes {
            let Some(a) = self.forest.attribute_node(attribute) else {
                continue;
            };
            let name = a.name().clone();
            let raw = a.value().to_string();
            // the stylesheet's own namespace declaration is not output
            if a.is_namespace_declaration() && raw == XSLT_NAMESPACE {
                continue;
            }
            // xsl:* attributes on literal elements steer the processor
            if name.uri() == Some(XSLT_NAMESPACE) {
                if name.local_name() == "use-attribute-sets" {
                    for set in raw.split_whitespace().map(|s| s.to_string()).collect::<Vec<_>>() {
                        self.apply_named_attribute_set(&set, context, created)?;
                    }
                }
                continue;
            }
            let value = if a.is_namespace_declaration() {
                raw
            } else {
                self.expand_avt(&raw, context)?
            };
            self.forest.set_attribute(created, name, value);
        }

        let body = self.forest.children(node).to_vec();
        self.instantiate_body(&body, context, created)
    }

    fn shallow_copy(&mut self, node: Node, output: Node) -> Result<Node> {
        match self.forest.value(node).clone() {
            Value::Element(element) => {
                let created = self.forest.new_element(element.name().clone());
                // namespace declarations travel with the element
                for attribute in element.attribute_nodes().to_vec() {
                    if let Value::Attribute(a) = self.forest.value(attribute).clone() {
                        if a.is_namespace_declaration() {
                            self.forest.set_attribute(created, a.name().clone(), a.value());
                        }
                    }
                }
                self.forest.append_child(output, created);
                Ok(created)
            }
            Value::Document(_) => Ok(output),
            _ => {
                let clone = self.forest.clone_node(node);
                self.forest.append_child(output, clone);
                Ok(output)
            }
        }
    }

    fn copy_attribute(&mut self, attribute: Node, output: Node) -> Result<()> {
        if self.forest.kind(output) != NodeKind::Element {
            return Err(Error::Load(
                "cannot copy an attribute to a non-element".to_string(),
            ));
        }
        if let Value::Attribute(a) = self.forest.value(attribute).clone() {
            self.forest.set_attribute(output, a.name().clone(), a.value());
        }
        Ok(())
    }

    fn emit_sequence(&mut self, value: Sequence, output: Node) -> Result<()> {
        for item in value.into_iter() {
            match item {
                Item::Node(node) => {
                    if self.forest.kind(node) == NodeKind::Attribute {
                        self.copy_attribute(node, output)?;
                    } else {
                        let clone = self.forest.clone_node(node);
                        self.forest.append_child(output, clone);
                    }
                }
                Item::Atomic(atomic) => self.emit_text(output, &atomic.string_value()),
            }
        }
        Ok(())
    }

    fn emit_text(&mut self, output: Node, text: &str) {
        if text.is_empty() {
            return;
        }
        // adjacent text nodes merge on output
        if let Some(&last) = self.forest.children(output).last() {
            if let Value::Text(existing) = self.forest.value(last) {
                let merged = format!("{}{}", existing.get(), text);
                if let Value::Text(t) = self.forest.value_mut(last) {
                    t.set(merged);
                }
                return;
            }
        }
        let node = self.forest.new_text(text);
        self.forest.append_child(output, node);
    }

    fn move_children(&mut self, from: Node, to: Node) {
        while let Some(&child) = self.forest.children(from).first() {
            self.forest.detach(child);
            self.forest.append_child(to, child);
        }
    }

    // --- attribute sets, params, sorting

    fn apply_attribute_sets(
        &mut self,
        element: Node,
        context: &Context,
        target: Node,
    ) -> Result<()> {
        let Some(sets) = self
            .forest
            .attribute_str(element, "use-attribute-sets")
            .map(|s| s.to_string())
        else {
            return Ok(());
        };
        for set in sets.split_whitespace() {
            self.apply_named_attribute_set(set, context, target)?;
        }
        Ok(())
    }

    fn apply_named_attribute_set(
        &mut self,
        name: &str,
        context: &Context,
        target: Node,
    ) -> Result<()> {
        let body = self
            .stylesheet
            .attribute_sets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Load(format!("unknown attribute set {:?}", name)))?;
        self.instantiate_body(&body, context, target)
    }

    fn collect_with_params(
        &mut self,
        element: Node,
        context: &Context,
    ) -> Result<Vec<(Name, Sequence)>> {
        let mut params = Vec::new();
        for &child in &self.forest.children(element).to_vec() {
            if xsl_local(self.forest, child).as_deref() != Some("with-param") {
                continue;
            }
            let name_text = required_attribute(self.forest, child, "name")?;
            let name = self.lexical_name(&name_text);
            let value = self.binding_value(child, context)?;
            params.push((name, value));
        }
        Ok(params)
    }

    /// `select` expression, single `xsl:sequence` body, or body fragment.
    fn binding_value(&mut self, element: Node, context: &Context) -> Result<Sequence> {
        if let Some(select) = self.forest.attribute_str(element, "select") {
            let select = select.to_string();
            return self.xpath(&select, context);
        }
        let body: Vec<Node> = self.forest.children(element).to_vec();
        let elements: Vec<Node> = body
            .iter()
            .copied()
            .filter(|&child| self.forest.is_element(child))
            .collect();
        if let [only] = elements.as_slice() {
            if xsl_local(self.forest, *only).as_deref() == Some("sequence") {
                let select = required_attribute(self.forest, *only, "select")?;
                return self.xpath(&select, context);
            }
        }
        if body.is_empty() {
            return Ok(Sequence::new());
        }
        let fragment = self.forest.new_document();
        self.instantiate_body(&body, context, fragment)?;
        Ok(Sequence::singleton(Item::Node(fragment)))
    }

    fn param_default(&mut self, param: &ParamDecl, context: &Context) -> Result<Sequence> {
        if let Some(select) = &param.select {
            let mut evaluator = Evaluator::new(self.forest, &mut self.env);
            return Ok(evaluator.evaluate(select, context)?);
        }
        if param.body.is_empty() {
            return Ok(Sequence::new());
        }
        let body = param.body.clone();
        let fragment = self.forest.new_document();
        self.instantiate_body(&body, context, fragment)?;
        Ok(Sequence::singleton(Item::Node(fragment)))
    }

    fn sort_items(&mut self, items: &mut Vec<Item>, element: Node) -> Result<()> {
        struct SortSpec {
            select: String,
            descending: bool,
            numeric: bool,
        }
        let mut specs = Vec::new();
        for &child in &self.forest.children(element).to_vec() {
            if xsl_local(self.forest, child).as_deref() != Some("sort") {
                continue;
            }
            specs.push(SortSpec {
                select: self
                    .forest
                    .attribute_str(child, "select")
                    .unwrap_or(".")
                    .to_string(),
                descending: self.forest.attribute_str(child, "order") == Some("descending"),
                numeric: self.forest.attribute_str(child, "data-type") == Some("number"),
            });
        }
        if specs.is_empty() {
            return Ok(());
        }


        // compute all keys up front, then sort stably
        let size = items.len();
        let mut keyed: Vec<(Vec<(Option<f64>, String)>, Item)> = Vec::with_capacity(size);
        for (index, item) in items.drain(..).enumerate() {
            let item_context = Context::with_focus(item.clone(), index + 1, size);
            let mut keys = Vec::with_capacity(specs.len());
            for spec in &specs {
                let value = self.xpath(&spec.select, &item_context)?;
                let text = value.string_join(self.forest, " ");
                let number = if spec.numeric {
                    Some(text.trim().parse::<f64>().unwrap_or(f64::NAN))
                } else {
                    None
                };
                keys.push((number, text));
            }
            keyed.push((keys, item));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            use std::cmp::Ordering;
            for (spec, (ka, kb)) in specs.iter().zip(a.iter().zip(b.iter())) {
                let ordering = match (ka.0, kb.0) {
                    (Some(na), Some(nb)) => na.partial_cmp(&nb).unwrap_or(Ordering::Equal),
                    _ => ka.1.cmp(&kb.1),
                };
                let ordering = if spec.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        items.extend(keyed.into_iter().map(|(_, item)| item));
        Ok(())
    }

    // --- expression plumbing

    /// Resolve a lexical QName written in the stylesheet against the
    /// in-scope prefixes.
    fn lexical_name(&self, text: &str) -> Name {
        let (prefix, local) = Name::split_prefix(text);
        match prefix {
            Some(prefix) => Name::new(
                local,
                self.env.namespaces.by_prefix(prefix).map(|s| s.to_string()),
                Some(prefix.to_string()),
            ),
            None => Name::local(local),
        }
    }

    fn xpath(&mut self, text: &str, context: &Context) -> Result<Sequence> {
        let expr = parse(text, &self.env.namespaces, &CompileOptions::default())?;
        let mut evaluator = Evaluator::new(self.forest, &mut self.env);
        Ok(evaluator.evaluate(&expr, context)?)
    }

    fn expand_avt(&mut self, text: &str, context: &Context) -> Result<String> {
        let avt = Avt::parse(text, &self.env.namespaces)?;
        let mut evaluator = Evaluator::new(self.forest, &mut self.env);
        avt.expand(&mut evaluator, context)
    }

    fn body_fragment(&mut self, element: Node, context: &Context) -> Result<Node> {
        let body = self.forest.children(element).to_vec();
        let fragment = self.forest.new_document();
        self.instantiate_body(&body, context, fragment)?;
        Ok(fragment)
    }
}
