use std::io;
use std::fs;
use std::path::Path;
use std::fmt::Write;

use itertools::Itertools;

use crate::{
  scalar::Real,
  variable::Variable,
};


impl<T: Real> Variable<T> {
  /// Render the graph that produced this Variable in Graphviz DOT format.
  ///
  /// Variables become ellipses labelled with their shape and type,
  /// operations become boxes labelled with their name. Edges lead from
  /// each input to its operation and on to the operation's output.

  pub fn to_dot(&self) -> String {
    let mut dot = String::from("digraph graphname {\n");
    let history = self.history();
    for node in &history {
      let dims = node.data.dims().iter().join(", ");
      let _ = writeln!(dot, "  v{} [label=\"({dims}), {}\", shape=\"oval\"];", node.id, T::NAME);
    }
    for node in &history {
      if let Some(origin) = &node.origin {
        let _ = writeln!(dot, "  f{} [label=\"{}\", shape=\"box\"];", node.id, origin.name());
      }
    }
    let edges = history.iter()
      .filter(|node| node.origin.is_some() )
      .flat_map(|node| node.inputs().iter()
        .map(|input| format!("v{} -> f{}", input.id, node.id) )
        .chain(std::iter::once(format!("f{} -> v{}", node.id, node.id)))
        .collect::<Vec<_>>())
      .unique();
    for edge in edges {
      let _ = writeln!(dot, "  {edge};");
    }
    dot.push_str("}\n");
    dot
  }

  pub fn write_dot(&self, path: impl AsRef<Path>) -> io::Result<()> {
    fs::write(path, self.to_dot())
  }
}


#[cfg(test)]
mod tests {
  use crate::{ Tensor, ops::RealOps };

  #[test]
  fn dot() {
    let x = Tensor::<f32>::ones(&[2,3]).tracked();
    let w = Tensor::ones(&[3,4]).trained();
    let y = x.mm(&w).relu();
    let dot = y.to_dot();
    assert!(dot.starts_with("digraph graphname {"));
    assert!(dot.contains(&format!("v{} [label=\"(2, 3), float32\", shape=\"oval\"];", x.id())));
    assert!(dot.contains("[label=\"matmul\", shape=\"box\"];"));
    assert!(dot.contains(&format!("f{} -> v{};", y.id(), y.id())));
    assert_eq!(dot.matches(" -> ").count(), 5);
    assert!(dot.trim_end().ends_with('}'));
  }

  #[test]
  fn shared_input() {
    // x * x lists the edge from x only once
    let x = Tensor::<f64>::ones(&[2]).trained();
    let y = &x * &x;
    assert_eq!(y.to_dot().matches(" -> ").count(), 2);
  }
}
