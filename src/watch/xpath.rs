//! xpath watch
//!
//! Parses each version as XML and evaluates an XPath 1.0 expression with
//! the configured namespace bindings. Node-set results serialize each node
//! back to XML text joined by newline; scalar results stringify.

use sxd_document::{dom, parser};
use sxd_xpath::{Context, Factory, Value, nodeset::Node};

use crate::{
   config::XpathWatch,
   error::{Result, VigilError},
   types::Extraction,
};

fn escape_xml(text: &str) -> String {
   text
      .replace('&', "&amp;")
      .replace('<', "&lt;")
      .replace('>', "&gt;")
      .replace('"', "&quot;")
}

fn serialize_element(element: dom::Element<'_>) -> String {
   let mut out = String::new();
   let name = element.name().local_part().to_string();

   out.push('<');
   out.push_str(&name);
   for attribute in element.attributes() {
      out.push(' ');
      out.push_str(attribute.name().local_part());
      out.push_str("=\"");
      out.push_str(&escape_xml(attribute.value()));
      out.push('"');
   }

   let children = element.children();
   if children.is_empty() {
      out.push_str("/>");
      return out;
   }

   out.push('>');
   for child in children {
      match child {
         dom::ChildOfElement::Element(inner) => out.push_str(&serialize_element(inner)),
         dom::ChildOfElement::Text(text) => out.push_str(&escape_xml(text.text())),
         dom::ChildOfElement::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment.text());
            out.push_str("-->");
         },
         dom::ChildOfElement::ProcessingInstruction(pi) => {
            out.push_str("<?");
            out.push_str(pi.target());
            if let Some(value) = pi.value() {
               out.push(' ');
               out.push_str(value);
            }
            out.push_str("?>");
         },
      }
   }
   out.push_str("</");
   out.push_str(&name);
   out.push('>');
   out
}

fn serialize_node(node: Node<'_>) -> String {
   match node {
      Node::Element(element) => serialize_element(element),
      Node::Attribute(attribute) => attribute.value().to_string(),
      Node::Text(text) => text.text().to_string(),
      Node::Comment(comment) => format!("<!--{}-->", comment.text()),
      Node::ProcessingInstruction(pi) => {
         format!("<?{} {}?>", pi.target(), pi.value().unwrap_or_default())
      },
      Node::Root(_) | Node::Namespace(_) => node.string_value(),
   }
}

/// XPath numbers print in integer form when integral
fn format_number(n: f64) -> String {
   if n.is_finite() && n.fract() == 0.0 {
      format!("{}", n as i64)
   } else {
      n.to_string()
   }
}

/// Compile the expression without evaluating it, for eager ruleset
/// validation
pub(crate) fn check_expression(expression: &str) -> Result<()> {
   Factory::new()
      .build(expression)
      .map_err(|e| VigilError::ExtractorError(format!("Invalid XPath expression: {e}")))?
      .ok_or_else(|| VigilError::ExtractorError("Empty XPath expression".to_string()))?;
   Ok(())
}

/// Evaluate the expression over the content as XML
pub fn extract(watch: &XpathWatch, content: &str) -> Result<Extraction> {
   let package = parser::parse(content)
      .map_err(|e| VigilError::ExtractorError(format!("XML parse failed: {e}")))?;
   let document = package.as_document();

   let factory = Factory::new();
   let xpath = factory
      .build(&watch.expression)
      .map_err(|e| VigilError::ExtractorError(format!("Invalid XPath expression: {e}")))?
      .ok_or_else(|| VigilError::ExtractorError("Empty XPath expression".to_string()))?;

   let mut context = Context::new();
   if let Some(namespaces) = &watch.namespaces {
      for (prefix, uri) in namespaces {
         context.set_namespace(prefix, uri);
      }
   }

   let value = xpath
      .evaluate(&context, document.root())
      .map_err(|e| VigilError::ExtractorError(format!("XPath evaluation failed: {e}")))?;

   let text = match value {
      Value::Nodeset(nodeset) => nodeset
         .document_order()
         .into_iter()
         .map(serialize_node)
         .collect::<Vec<_>>()
         .join("\n"),
      Value::String(s) => s,
      Value::Number(n) => format_number(n),
      Value::Boolean(b) => b.to_string(),
   };

   Ok(Extraction { text, context: Vec::new() })
}
