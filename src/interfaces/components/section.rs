use crate::application::dashboard::SectionView;
use crate::interfaces::design_system::DesignSystem;
use eframe::egui;

/// Titled container for one dashboard section.
///
/// Loading and error states render inline inside the section, so a failed
/// chart never hides the form or the history next to it.
pub struct Section {
    title: String,
    min_height: f32,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            min_height: 0.0,
        }
    }

    pub fn min_height(mut self, height: f32) -> Self {
        self.min_height = height;
        self
    }

    /// Render `view`: a spinner while loading, the error's user message on
    /// failure, `add_contents` with the data otherwise.
    pub fn show_view<T>(
        self,
        ui: &mut egui::Ui,
        view: &SectionView<T>,
        add_contents: impl FnOnce(&mut egui::Ui, &T),
    ) {
        DesignSystem::section_frame().show(ui, |ui| {
            ui.set_min_height(self.min_height);
            ui.horizontal(|ui| {
                DesignSystem::section_title(ui, &self.title);
                if let SectionView::Ready { refreshing: true, .. } = view {
                    ui.add(egui::Spinner::new().size(12.0));
                }
            });

            match view {
                SectionView::Loading => loading_placeholder(ui),
                SectionView::Failed(error) => {
                    error_placeholder(ui, error.user_message(), &error.to_string())
                }
                SectionView::Ready { data, .. } => add_contents(ui, data),
            }
        });
    }

    pub fn show<R>(self, ui: &mut egui::Ui, add_contents: impl FnOnce(&mut egui::Ui) -> R) -> R {
        DesignSystem::section_frame()
            .show(ui, |ui| {
                ui.set_min_height(self.min_height);
                DesignSystem::section_title(ui, &self.title);
                add_contents(ui)
            })
            .inner
    }
}

fn loading_placeholder(ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        ui.add(egui::Spinner::new());
        ui.label(egui::RichText::new("Loading...").color(DesignSystem::TEXT_SECONDARY));
    });
}

fn error_placeholder(ui: &mut egui::Ui, message: &str, detail: &str) {
    ui.label(egui::RichText::new(message).color(DesignSystem::DANGER).strong())
        .on_hover_text(detail);
}
