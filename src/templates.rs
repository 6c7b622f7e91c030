//! Sample inspection-report documents for testing and demonstration.
//!
//! Each sample exercises a different shape of input: regular A4 pages, an
//! overflowing page, externally hosted photos, and a document with no page
//! markers at all.

/// Names accepted by [`by_name`].
pub const NAMES: [&str; 5] = ["report", "solid", "tall", "photos", "unpaginated"];

/// Look up a sample by name. `photos` points its images at
/// `https://photos.example.com`.
pub fn by_name(name: &str) -> Option<String> {
    match name {
        "report" => Some(inspection_report().to_string()),
        "solid" => Some(solid_pages(&["#1d4ed8", "#15803d"])),
        "tall" => Some(tall_page_report().to_string()),
        "photos" => Some(photo_report("https://photos.example.com")),
        "unpaginated" => Some(unpaginated_document().to_string()),
        _ => None,
    }
}

/// Two-page mould inspection report with headings, a findings table and a
/// remediation list.
pub fn inspection_report() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head><title>Inspection report</title></head>
<body>
<section class="pdf-page bg-white p-8" style="width:794px; height:1123px">
    <header class="flex justify-between items-center mb-6 pb-4 border-b border-gray-300">
        <h1 class="text-3xl font-bold" style="color:#0f766e">Mould Inspection Report</h1>
        <p class="text-sm text-gray-500">Job #MI-2025-0412</p>
    </header>

    <div class="grid grid-cols-2 gap-4 mb-6">
        <div>
            <p class="font-bold">Property</p>
            <p>14 Harbour View Rd, Unit 4B</p>
            <p>Inspected 12 March 2025</p>
        </div>
        <div>
            <p class="font-bold">Technician</p>
            <p>Field team 3</p>
            <p>IICRC certified</p>
        </div>
    </div>

    <h2 class="text-xl font-bold mb-2">Findings</h2>
    <table class="w-full mb-6">
        <tr>
            <th class="text-left p-2 bg-gray-200">Area</th>
            <th class="text-left p-2 bg-gray-200">Moisture</th>
            <th class="text-left p-2 bg-gray-200">Visible growth</th>
        </tr>
        <tr>
            <td class="p-2">Bathroom ceiling</td>
            <td class="p-2">38%</td>
            <td class="p-2 text-red-600">Yes</td>
        </tr>
        <tr>
            <td class="p-2">Bedroom 2 wardrobe</td>
            <td class="p-2">24%</td>
            <td class="p-2 text-red-600">Yes</td>
        </tr>
        <tr>
            <td class="p-2">Living room</td>
            <td class="p-2">12%</td>
            <td class="p-2 text-green-600">No</td>
        </tr>
    </table>

    <p class="text-sm text-gray-600">
        Readings above 20% indicate conditions that support active growth.
        Affected materials should be treated before repainting.
    </p>
</section>

<section class="report-page bg-white p-8" style="width:794px; height:1123px">
    <h2 class="text-xl font-bold mb-4">Remediation plan</h2>
    <ol class="mb-6">
        <li>Contain affected rooms and run HEPA air scrubbers.</li>
        <li>Remove and bag water-damaged plasterboard.</li>
        <li>Apply antimicrobial treatment to framing.</li>
        <li>Dry to below 15% and verify with a final reading.</li>
    </ol>

    <h2 class="text-xl font-bold mb-2">Prevention</h2>
    <ul class="mb-6">
        <li>Install an exhaust fan rated for the bathroom volume.</li>
        <li>Keep wardrobe doors ajar in winter.</li>
    </ul>

    <footer class="mt-8 pt-4 border-t border-gray-300">
        <p class="text-xs text-gray-500">This report reflects conditions on the day of inspection.</p>
    </footer>
</section>
</body>
</html>
"##
}

/// One 794×1123 px page per colour, each filled solid.
pub fn solid_pages(colors: &[&str]) -> String {
    let pages: String = colors
        .iter()
        .map(|color| {
            format!(
                r#"<div class="pdf-page" style="width:794px; height:1123px; background-color:{color}"></div>"#
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("<html><body>\n{pages}\n</body></html>")
}

/// A single page whose moisture log overflows well past one A4 height.
pub fn tall_page_report() -> &'static str {
    r##"<html><body>
<div class="pdf-page p-8" style="width:794px; height:1123px">
    <h1 class="text-2xl font-bold mb-4">Moisture log</h1>
    <div style="height:900px; background-color:#e0f2fe"></div>
    <div style="height:900px; background-color:#fef3c7"></div>
    <div style="height:900px; background-color:#fee2e2"></div>
</div>
</body></html>
"##
}

/// Page with an `<img>` photo and a CSS background, both hosted under
/// `base_url`. The same photo is referenced twice.
pub fn photo_report(base_url: &str) -> String {
    format!(
        r#"<html><body>
<div class="report-page p-8" style="width:794px; height:1123px">
    <h1 class="text-2xl font-bold mb-4">Site photos</h1>
    <div style="height:120px; background-image:url('{base_url}/banner.png')"></div>
    <img src="{base_url}/ceiling.png" width="320" height="240">
    <p class="mt-2">Bathroom ceiling, north corner.</p>
    <img src="{base_url}/ceiling.png" width="160" height="120">
    <p class="mt-2">Detail.</p>
</div>
</body></html>
"#
    )
}

/// Valid HTML without any page marker.
pub fn unpaginated_document() -> &'static str {
    r#"<html><body>
<div class="page"><h1>Draft</h1><p>Page markers have not been added yet.</p></div>
</body></html>
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn every_name_resolves() {
        for name in NAMES {
            let html = by_name(name).unwrap();
            assert!(!parse_html(&html).is_empty(), "{name} should parse");
        }
        assert!(by_name("invoice").is_none());
    }

    #[test]
    fn solid_pages_marks_each_page() {
        let html = solid_pages(&["red", "blue", "#000"]);
        assert_eq!(html.matches("class=\"pdf-page\"").count(), 3);
        assert!(html.contains("background-color:blue"));
    }

    #[test]
    fn photo_report_repeats_one_url() {
        let html = photo_report("https://cdn.test");
        assert_eq!(html.matches("https://cdn.test/ceiling.png").count(), 2);
        assert!(html.contains("url('https://cdn.test/banner.png')"));
    }
}
