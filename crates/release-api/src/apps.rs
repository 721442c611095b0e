use artifactdrop_protocol::{ConnectedApp, Platform};

/// Filters connected apps by platform and a case-insensitive search over
/// app name and project title. An empty query matches everything.
pub fn filter_apps<'a>(
    apps: &'a [ConnectedApp],
    platform: Option<Platform>,
    query: &str,
) -> Vec<&'a ConnectedApp> {
    let query = query.trim().to_lowercase();
    apps.iter()
        .filter(|app| platform.is_none_or(|p| app.platform == p))
        .filter(|app| {
            query.is_empty()
                || app.app_name.to_lowercase().contains(&query)
                || app
                    .project_title
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&query))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str, name: &str, platform: Platform, title: Option<&str>) -> ConnectedApp {
        ConnectedApp {
            id: id.into(),
            app_name: name.into(),
            platform,
            project_title: title.map(Into::into),
            store_app_id: None,
        }
    }

    fn sample() -> Vec<ConnectedApp> {
        vec![
            app("1", "Shop", Platform::Ios, Some("Retail Suite")),
            app("2", "Shop", Platform::Android, Some("Retail Suite")),
            app("3", "Tracker", Platform::Android, None),
        ]
    }

    #[test]
    fn no_filters_returns_all() {
        let apps = sample();
        assert_eq!(filter_apps(&apps, None, "").len(), 3);
    }

    #[test]
    fn platform_filter() {
        let apps = sample();
        let ids: Vec<_> = filter_apps(&apps, Some(Platform::Android), "")
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, ["2", "3"]);
    }

    #[test]
    fn search_matches_project_title_case_insensitively() {
        let apps = sample();
        let found = filter_apps(&apps, Some(Platform::Ios), "RETAIL");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");
    }

    #[test]
    fn search_without_title_match() {
        let apps = sample();
        assert_eq!(filter_apps(&apps, None, "track").len(), 1);
        assert!(filter_apps(&apps, None, "nothing").is_empty());
    }
}
