use angle_xml::Forest;
use angle_xslt::{Error, Stylesheet, Transformer};

const XSL_NS: &str = "http://www.w3.org/1999/XSL/Transform";

fn transform(sheet_text: &str, source_text: &str) -> String {
    let mut forest = Forest::new();
    let sheet = Stylesheet::load(&mut forest, sheet_text).unwrap();
    let source = forest.parse(source_text).unwrap();
    let mut transformer = Transformer::new(&mut forest, &sheet);
    let result = transformer.transform(source).unwrap();
    transformer.render(result)
}

fn sheet_of(body: &str) -> String {
    format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}">{}</xsl:stylesheet>"#,
        XSL_NS, body
    )
}

#[test]
fn scenario_simplified_stylesheet() {
    let sheet = format!(
        r#"<html xsl:version="3.0" xmlns:xsl="{}"><body><xsl:value-of select="/root/item"/></body></html>"#,
        XSL_NS
    );
    let output = transform(&sheet, "<root><item>hello</item></root>");
    insta::assert_snapshot!(output, @"<html><body>hello</body></html>");
}

#[test]
fn scenario_for_each_group_emits_each_key_once() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <keys>
    <xsl:for-each-group select="/r/n" group-by="@k">
      <key><xsl:value-of select="current-grouping-key()"/></key>
    </xsl:for-each-group>
  </keys>
</xsl:template>"#,
    );
    let output = transform(&sheet, r#"<r><n k="a"/><n k="b"/><n k="a"/></r>"#);
    assert!(
        output.contains("<key>a</key><key>b</key>")
            || output.contains("<key>a</key>\n") && output.contains("<key>b</key>"),
        "output: {}",
        output
    );
    assert_eq!(output.matches("<key>a</key>").count(), 1);
    assert_eq!(output.matches("<key>b</key>").count(), 1);
}

#[test]
fn scenario_try_catch_division_by_zero() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out><xsl:try><xsl:value-of select="1 div 0"/><xsl:catch><fallback/></xsl:catch></xsl:try></out>
</xsl:template>"#,
    );
    let output = transform(&sheet, "<r/>");
    assert!(output.contains("<fallback/>"), "output: {}", output);
}

#[test]
fn test_terminate_escapes_try() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <xsl:try>
    <xsl:message terminate="yes">stop here</xsl:message>
    <xsl:catch><swallowed/></xsl:catch>
  </xsl:try>
</xsl:template>"#,
    );
    let mut forest = Forest::new();
    let sheet = Stylesheet::load(&mut forest, &sheet).unwrap();
    let source = forest.parse("<r/>").unwrap();
    let mut transformer = Transformer::new(&mut forest, &sheet);
    assert!(matches!(
        transformer.transform(source),
        Err(Error::Terminate(_))
    ));
}

#[test]
fn test_template_matching_and_modes() {
    let sheet = sheet_of(
        r#"<xsl:template match="/"><out><xsl:apply-templates select="/r/*"/>|<xsl:apply-templates select="/r/*" mode="loud"/></out></xsl:template>
<xsl:template match="a">a</xsl:template>
<xsl:template match="*">other</xsl:template>
<xsl:template match="a" mode="loud">A!</xsl:template>
<xsl:template match="*" mode="loud">OTHER!</xsl:template>"#,
    );
    let output = transform(&sheet, "<r><a/><b/></r>");
    assert!(output.contains("aother|A!OTHER!"), "output: {}", output);
}

#[test]
fn test_priority_overrides_name_specificity() {
    let sheet = sheet_of(
        r#"<xsl:template match="/"><out><xsl:apply-templates select="/r/a"/></out></xsl:template>
<xsl:template match="a">name</xsl:template>
<xsl:template match="*" priority="2">wildcard</xsl:template>"#,
    );
    let output = transform(&sheet, "<r><a/></r>");
    assert!(output.contains("wildcard"), "output: {}", output);
}

#[test]
fn test_call_template_with_params() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out><xsl:call-template name="greet"><xsl:with-param name="who" select="'world'"/></xsl:call-template></out>
</xsl:template>
<xsl:template name="greet">
  <xsl:param name="who" select="'nobody'"/>
  <xsl:value-of select="concat('hello ', $who)"/>
</xsl:template>"#,
    );
    let output = transform(&sheet, "<r/>");
    assert!(output.contains("hello world"), "output: {}", output);
}

#[test]
fn test_param_default_applies_without_override() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out><xsl:call-template name="greet"/></out>
</xsl:template>
<xsl:template name="greet">
  <xsl:param name="who" select="'nobody'"/>
  <xsl:value-of select="$who"/>
</xsl:template>"#,
    );
    let output = transform(&sheet, "<r/>");
    assert!(output.contains("nobody"), "output: {}", output);
}

#[test]
fn test_for_each_with_sort() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out><xsl:for-each select="/r/n"><xsl:sort select="." data-type="number" order="descending"/><v><xsl:value-of select="."/></v></xsl:for-each></out>
</xsl:template>"#,
    );
    let output = transform(&sheet, "<r><n>2</n><n>10</n><n>1</n></r>");
    assert!(
        output.contains("<v>10</v><v>2</v><v>1</v>"),
        "output: {}",
        output
    );
}

#[test]
fn test_avt_expansion() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out id="node-{count(/r/*)}" literal="{{kept}}"/>
</xsl:template>"#,
    );
    let output = transform(&sheet, "<r><a/><b/></r>");
    assert!(output.contains(r#"id="node-2""#), "output: {}", output);
    assert!(output.contains(r#"literal="{kept}""#), "output: {}", output);
}

#[test]
fn test_variable_scoping_and_sequence() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <xsl:variable name="xs"><xsl:sequence select="/r/n"/></xsl:variable>
  <out><xsl:value-of select="count($xs)"/></out>
</xsl:template>"#,
    );
    let output = transform(&sheet, "<r><n/><n/><n/></r>");
    assert!(output.contains("<out>3</out>"), "output: {}", output);
}

#[test]
fn test_choose_and_if() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out>
    <xsl:choose>
      <xsl:when test="/r/@k = 'x'">x</xsl:when>
      <xsl:otherwise>y</xsl:otherwise>
    </xsl:choose>
    <xsl:if test="/r/@k">has-attr</xsl:if>
  </out>
</xsl:template>"#,
    );
    let output = transform(&sheet, r#"<r k="z"/>"#);
    assert!(output.contains("y"), "output: {}", output);
    assert!(output.contains("has-attr"), "output: {}", output);
}

#[test]
fn test_copy_of_and_copy() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out><xsl:copy-of select="/r/n"/></out>
</xsl:template>"#,
    );
    let output = transform(&sheet, r#"<r><n k="1"><d/></n></r>"#);
    assert!(output.contains(r#"<n k="1"><d/></n>"#), "output: {}", output);

    let sheet = sheet_of(
        r#"<xsl:template match="/"><xsl:apply-templates/></xsl:template>
<xsl:template match="*"><xsl:copy><xsl:apply-templates/></xsl:copy></xsl:template>"#,
    );
    let output = transform(&sheet, "<r><n>t</n></r>");
    assert!(output.contains("<r><n>t</n></r>"), "output: {}", output);
}

#[test]
fn test_element_attribute_text_comment() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <xsl:element name="made">
    <xsl:attribute name="k" select="'v'"/>
    <xsl:comment>note</xsl:comment>
    <xsl:text>body</xsl:text>
  </xsl:element>
</xsl:template>"#,
    );
    let output = transform(&sheet, "<r/>");
    assert!(
        output.contains(r#"<made k="v"><!--note-->body</made>"#),
        "output: {}",
        output
    );
}

#[test]
fn test_merge_visits_keys_in_order() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out><xsl:merge>
    <xsl:merge-source name="left" select="/r/a/n"><xsl:merge-key select="@k"/></xsl:merge-source>
    <xsl:merge-source name="right" select="/r/b/n"><xsl:merge-key select="@k"/></xsl:merge-source>
    <xsl:merge-action><g key="{current-merge-key()}"><xsl:value-of select="count(current-merge-group())"/></g></xsl:merge-action>
  </xsl:merge></out>
</xsl:template>"#,
    );
    let output = transform(
        &sheet,
        r#"<r><a><n k="2"/><n k="1"/></a><b><n k="3"/><n k="1"/></b></r>"#,
    );
    assert!(
        output.contains(r#"<g key="1">2</g><g key="2">1</g><g key="3">1</g>"#),
        "output: {}",
        output
    );
}

#[test]
fn test_mode_no_match_policies() {
    // default text-only-copy lets text through
    let sheet = sheet_of(r#"<xsl:template match="a"><found/></xsl:template>"#);
    let output = transform(&sheet, "<r>text<a/></r>");
    assert!(output.contains("text"), "output: {}", output);
    assert!(output.contains("<found/>"), "output: {}", output);

    // deep-skip drops unmatched subtrees entirely
    let sheet = sheet_of(
        r#"<xsl:mode on-no-match="deep-skip"/>
<xsl:template match="/"><out><xsl:apply-templates/></out></xsl:template>"#,
    );
    let output = transform(&sheet, "<r>text<a/></r>");
    assert!(output.contains("<out/>"), "output: {}", output);

    // fail turns an unmatched node into an error
    let sheet_text = sheet_of(r#"<xsl:mode on-no-match="fail"/>"#);
    let mut forest = Forest::new();
    let sheet = Stylesheet::load(&mut forest, &sheet_text).unwrap();
    let source = forest.parse("<r/>").unwrap();
    let mut transformer = Transformer::new(&mut forest, &sheet);
    assert!(transformer.transform(source).is_err());
}

#[test]
fn test_result_document_is_buffered() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <main/>
  <xsl:result-document href="side.xml"><side><xsl:value-of select="/r/@k"/></side></xsl:result-document>
</xsl:template>"#,
    );
    let mut forest = Forest::new();
    let sheet = Stylesheet::load(&mut forest, &sheet).unwrap();
    let source = forest.parse(r#"<r k="7"/>"#).unwrap();
    let mut transformer = Transformer::new(&mut forest, &sheet);
    let result = transformer.transform(source).unwrap();
    assert_eq!(transformer.result_documents.len(), 1);
    assert_eq!(transformer.result_documents[0].href, "side.xml");
    assert!(transformer.result_documents[0].content.contains("<side>7</side>"));
    let main = transformer.render(result);
    assert!(main.contains("<main/>"), "output: {}", main);
    assert!(!main.contains("side"), "output: {}", main);
}

#[test]
fn test_message_trace() {
    let sheet = sheet_of(
        r#"<xsl:template match="/"><xsl:message>saw <xsl:value-of select="name(/r)"/></xsl:message><out/></xsl:template>"#,
    );
    let mut forest = Forest::new();
    let sheet = Stylesheet::load(&mut forest, &sheet).unwrap();
    let source = forest.parse("<r/>").unwrap();
    let mut messages: Vec<String> = Vec::new();
    {
        let mut transformer = Transformer::new(&mut forest, &sheet)
            .with_trace(Box::new(|text| messages.push(text.to_string())));
        transformer.transform(source).unwrap();
    }
    assert_eq!(messages, vec!["saw r".to_string()]);
}

#[test]
fn test_determinism_two_runs() {
    let sheet_text = sheet_of(
        r#"<xsl:template match="/"><out><xsl:for-each-group select="//n" group-by="@k"><g><xsl:value-of select="current-grouping-key()"/>:<xsl:value-of select="count(current-group())"/></g></xsl:for-each-group></out></xsl:template>"#,
    );
    let source_text = r#"<r><n k="b"/><n k="a"/><n k="b"/></r>"#;
    let first = transform(&sheet_text, source_text);
    let second = transform(&sheet_text, source_text);
    assert_eq!(first, second);
}

#[test]
fn test_import_and_apply_imports() {
    let imported = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}">
  <xsl:template match="n"><base><xsl:value-of select="."/></base></xsl:template>
</xsl:stylesheet>"#,
        XSL_NS
    );
    let main = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}">
  <xsl:import href="base.xsl"/>
  <xsl:template match="/"><out><xsl:apply-templates select="/r/n"/></out></xsl:template>
  <xsl:template match="n"><wrapped><xsl:apply-imports/></wrapped></xsl:template>
</xsl:stylesheet>"#,
        XSL_NS
    );
    let mut forest = Forest::new();
    let resolver = move |href: &str| -> angle_xslt::Result<String> {
        if href == "base.xsl" {
            Ok(imported.clone())
        } else {
            Err(Error::Load(format!("unknown href {:?}", href)))
        }
    };
    let sheet = Stylesheet::load_with_resolver(&mut forest, &main, &resolver).unwrap();
    let source = forest.parse("<r><n>x</n></r>").unwrap();
    let mut transformer = Transformer::new(&mut forest, &sheet);
    let result = transformer.transform(source).unwrap();
    let output = transformer.render(result);
    assert!(
        output.contains("<wrapped><base>x</base></wrapped>"),
        "output: {}",
        output
    );
}

#[test]
fn test_attribute_sets() {
    let sheet = sheet_of(
        r#"<xsl:attribute-set name="common"><xsl:attribute name="class" select="'main'"/></xsl:attribute-set>
<xsl:template match="/"><xsl:element name="out" use-attribute-sets="common"/></xsl:template>"#,
    );
    let output = transform(&sheet, "<r/>");
    assert!(output.contains(r#"<out class="main"/>"#), "output: {}", output);
}

#[test]
fn test_source_document_switches_context() {
    let sheet = sheet_of(
        r#"<xsl:template match="/">
  <out><xsl:source-document href="other.xml"><xsl:value-of select="/other/v"/></xsl:source-document></out>
</xsl:template>"#,
    );
    let mut forest = Forest::new();
    let resolver = |href: &str| -> angle_xslt::Result<String> {
        if href == "other.xml" {
            Ok("<other><v>42</v></other>".to_string())
        } else {
            Err(Error::Load(format!("unknown href {:?}", href)))
        }
    };
    let sheet = Stylesheet::load(&mut forest, &sheet).unwrap();
    let source = forest.parse("<r/>").unwrap();
    let mut transformer = Transformer::new(&mut forest, &sheet).with_resolver(&resolver);
    let result = transformer.transform(source).unwrap();
    let output = transformer.render(result);
    assert!(output.contains("<out>42</out>"), "output: {}", output);
}
