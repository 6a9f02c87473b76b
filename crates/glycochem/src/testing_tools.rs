use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};

/// Renders a diagnostic the way a terminal would show it, minus the colors
pub(crate) fn render_diagnostic(diagnostic: &dyn Diagnostic) -> String {
    let mut out = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        .with_width(80)
        .render_report(&mut out, diagnostic)
        .unwrap();
    out
}

macro_rules! assert_diagnostic_contains {
    ($result:expr, $($needle:expr),+ $(,)?) => {{
        let error = $result.unwrap_err();
        let rendered = $crate::testing_tools::render_diagnostic(&*error);
        $(
            assert!(
                rendered.contains($needle),
                "the rendered diagnostic didn't contain {:?}:\n{rendered}",
                $needle
            );
        )+
    }};
}

pub(crate) use assert_diagnostic_contains;
