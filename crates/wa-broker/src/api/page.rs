//! Self-polling QR login page.

use crate::login::InitiatedLogin;

/// Page showing the QR image that polls the callback and goes home on success.
pub(super) fn qr_page(prefix: &str, login: &InitiatedLogin) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>WhatsApp QR login</title>
  </head>
  <body>
    <img src="data:image/png;base64,{image}" alt="Login QR Code"/>
    <script>
      async function subscribe() {{
        const response = await fetch("{prefix}/qr-callback?id={id}");
        if (response.status !== 200) {{
          console.log(response.statusText);
        }} else {{
          window.location.replace("/");
        }}
      }}
      subscribe();
    </script>
  </body>
</html>
"#,
        image = login.qr_png_base64,
        prefix = prefix,
        id = login.login_id,
    )
}
